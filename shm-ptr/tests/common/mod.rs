#![allow(dead_code)]
use bytemuck::AnyBitPattern;

pub const MESSAGE: &[u8] = b"Hello";

/// A record as another process would lay it out.
#[derive(Clone, Copy, Debug, PartialEq, AnyBitPattern)]
#[repr(C)]
pub struct TestStruct {
    pub number: i32,
    pub real: f32,
    pub true_or_false: u8,
    pub text: [u8; 16],
}

impl TestStruct {
    pub fn text(&self) -> &[u8] {
        let end = self
            .text
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.text.len());
        &self.text[..end]
    }

    pub fn set_text(&mut self, text: &[u8]) {
        self.text = [0; 16];
        self.text[..text.len()].copy_from_slice(text);
    }
}

/// A name no other test, and no concurrent run of this suite, uses.
pub fn unique_name(test: &str) -> String {
    format!("/shm-ptr-{}-{}", std::process::id(), test)
}
