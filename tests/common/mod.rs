//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use docraster::document::{DocumentSession, OpenOptions};
use docraster::engine::RecordingEngine;
use tempfile::TempDir;

pub struct Fixture {
    pub dir: TempDir,
    pub engine: Arc<RecordingEngine>,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("temp dir"),
            engine: Arc::new(RecordingEngine::new()),
        }
    }

    /// Write a fixture document and return its path
    pub fn write(&self, name: &str, body: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, body).expect("write fixture");
        path
    }

    /// A plain document with `pages` pages of `width` x `height` points
    pub fn document(&self, pages: u32, width: f32, height: f32) -> PathBuf {
        self.write("doc.pdf", &RecordingEngine::fixture(pages, width, height))
    }

    /// A document with extra `key=value` lines
    pub fn document_with(&self, pages: u32, width: f32, height: f32, extra: &str) -> PathBuf {
        let body = format!("{}{}\n", RecordingEngine::fixture(pages, width, height), extra);
        self.write("doc.pdf", &body)
    }

    pub fn open(&self, path: &Path) -> DocumentSession {
        DocumentSession::open_path(self.engine.clone(), path, &OpenOptions::default())
            .expect("open fixture")
    }

    pub fn output(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}
