use crate::{
    error::{PixelforgeError, Result},
    generator::ImageGenerator,
    models::{GeneratorInfo, ImageResult},
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub(crate) const FAKE_IMAGE: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 1, 2, 3];

/// One canned reply from the scripted generator.
#[derive(Debug, Clone)]
pub(crate) enum Reply {
    Image,
    Refuse(&'static str),
    RefuseWithoutMessage,
    Raise(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EditCall {
    pub prompt: String,
    pub buffer_len: usize,
    pub mime_type: Option<String>,
}

/// Generator double that plays back queued replies and records every call.
/// An exhausted script answers with a successful image.
pub(crate) struct ScriptedGenerator {
    available: bool,
    replies: Mutex<VecDeque<Reply>>,
    generate_calls: AtomicUsize,
    edit_calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
    edits: Mutex<Vec<EditCall>>,
}

impl ScriptedGenerator {
    pub fn new(replies: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            available: true,
            replies: Mutex::new(replies.into_iter().collect()),
            generate_calls: AtomicUsize::new(0),
            edit_calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
            edits: Mutex::new(Vec::new()),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new(Vec::<Reply>::new())
        }
    }

    pub fn generate_calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }

    pub fn edit_calls(&self) -> usize {
        self.edit_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.generate_calls() + self.edit_calls()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn edits(&self) -> Vec<EditCall> {
        self.edits.lock().unwrap().clone()
    }

    fn next_reply(&self) -> Result<ImageResult> {
        let reply = self.replies.lock().unwrap().pop_front().unwrap_or(Reply::Image);
        match reply {
            Reply::Image => Ok(ImageResult::success(FAKE_IMAGE.to_vec())),
            Reply::Refuse(message) => Ok(ImageResult::failure(message)),
            Reply::RefuseWithoutMessage => Ok(ImageResult {
                success: false,
                buffer: None,
                error: None,
                metadata: None,
            }),
            Reply::Raise(message) => Err(PixelforgeError::AwsError(message.to_string())),
        }
    }
}

#[async_trait]
impl ImageGenerator for ScriptedGenerator {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn generate_image(&self, prompt: &str) -> Result<ImageResult> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.next_reply()
    }

    async fn edit_image(
        &self,
        prompt: &str,
        buffer: &[u8],
        mime_type: Option<&str>,
    ) -> Result<ImageResult> {
        self.edit_calls.fetch_add(1, Ordering::SeqCst);
        self.edits.lock().unwrap().push(EditCall {
            prompt: prompt.to_string(),
            buffer_len: buffer.len(),
            mime_type: mime_type.map(String::from),
        });
        self.next_reply()
    }

    fn info(&self) -> GeneratorInfo {
        GeneratorInfo::new("scripted")
            .with_version("test")
            .with_supported_formats(["image/png"])
    }
}
