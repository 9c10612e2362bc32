use super::{require_id, ResourceRepository};
use crate::domain::model::{HostInfo, VolumeAttachmentSpec};
use crate::error::{Error, Result};

const KIND: &str = "attachment";

impl ResourceRepository {
    /// Store an attachment under its volume
    pub async fn create_attachment(
        &self,
        volume_id: &str,
        attachment: &VolumeAttachmentSpec,
    ) -> Result<VolumeAttachmentSpec> {
        require_id("volume", volume_id)?;
        require_id(KIND, &attachment.base.id)?;
        if !attachment.volume_id.is_empty() && attachment.volume_id != volume_id {
            return Err(Error::Validation(format!(
                "attachment {} belongs to volume {}, not {}",
                attachment.base.id, attachment.volume_id, volume_id
            )));
        }

        let mut record = attachment.clone();
        record.volume_id = volume_id.to_string();
        self.create_record(KIND, &self.keys.attachment(volume_id, &record.base.id), &record)
            .await?;
        Ok(record)
    }

    pub async fn get_attachment(&self, volume_id: &str, id: &str) -> Result<VolumeAttachmentSpec> {
        self.get_record(KIND, id, &self.keys.attachment(volume_id, id))
            .await
    }

    /// Attachments of one volume
    pub async fn list_attachments(&self, volume_id: &str) -> Result<Vec<VolumeAttachmentSpec>> {
        self.list_records(KIND, &self.keys.attachments(volume_id))
            .await
    }

    /// Apply a non-empty mountpoint and the non-empty host fields
    pub async fn update_attachment(
        &self,
        volume_id: &str,
        id: &str,
        mountpoint: &str,
        host: &HostInfo,
    ) -> Result<VolumeAttachmentSpec> {
        let mut attachment = self.get_attachment(volume_id, id).await?;

        if !mountpoint.is_empty() {
            attachment.mountpoint = mountpoint.to_string();
        }
        merge_host(&mut attachment.host_info, host);
        attachment.base.touch();

        self.update_record(KIND, &self.keys.attachment(volume_id, id), &attachment)
            .await?;
        Ok(attachment)
    }

    pub async fn delete_attachment(&self, volume_id: &str, id: &str) -> Result<()> {
        self.delete_record(KIND, &self.keys.attachment(volume_id, id))
            .await
    }
}

fn merge_host(target: &mut HostInfo, input: &HostInfo) {
    let fields = [
        (&mut target.host, &input.host),
        (&mut target.ip, &input.ip),
        (&mut target.initiator, &input.initiator),
        (&mut target.platform, &input.platform),
        (&mut target.os_type, &input.os_type),
    ];
    for (slot, value) in fields {
        if !value.is_empty() {
            *slot = value.clone();
        }
    }
}
