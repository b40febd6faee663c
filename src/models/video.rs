/// A video selected for analysis, ready to be sent to the service.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl UploadRequest {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
