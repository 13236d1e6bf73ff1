#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use async_trait::async_trait;
use kiosk_signage::config::Credentials;
use kiosk_signage::display::DisplaySurface;
use kiosk_signage::error::ShareError;
use kiosk_signage::events::DecodedImage;
use kiosk_signage::remote::{ShareBackend, ShareEntry};

/// Knobs and call log for [`FakeShare`].
#[derive(Debug, Default)]
pub struct Script {
    pub fail_connect: bool,
    pub fail_auth: bool,
    pub fail_mount: bool,
    pub fail_list: bool,
    pub fail_close_session: bool,
    pub drop_connection: bool,
    pub entries: Vec<ShareEntry>,
    pub files: HashMap<String, Vec<u8>>,
    pub connected: bool,
    pub connect_attempts: usize,
    pub calls: Vec<&'static str>,
}

impl Script {
    pub fn with_files(names: &[&str]) -> Self {
        let mut script = Self::default();
        for name in names {
            script.entries.push(entry(name));
            script
                .files
                .insert(format!("Display/{name}"), name.as_bytes().to_vec());
        }
        script
    }
}

pub fn entry(name: &str) -> ShareEntry {
    ShareEntry {
        name: name.to_string(),
        is_dir: false,
        changed: SystemTime::UNIX_EPOCH,
        size: 1,
    }
}

pub struct FakeShare(pub Arc<Mutex<Script>>);

impl FakeShare {
    pub fn new(script: Script) -> (Self, Arc<Mutex<Script>>) {
        let shared = Arc::new(Mutex::new(script));
        (Self(shared.clone()), shared)
    }

    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.0.lock().unwrap()
    }
}

#[async_trait]
impl ShareBackend for FakeShare {
    async fn connect(&mut self, server: &str) -> Result<(), ShareError> {
        let mut s = self.script();
        s.connect_attempts += 1;
        s.calls.push("connect");
        if s.fail_connect {
            return Err(ShareError::Connect {
                server: server.to_string(),
                reason: "unreachable".to_string(),
            });
        }
        s.connected = true;
        Ok(())
    }

    async fn authenticate(&mut self, _credentials: &Credentials) -> Result<(), ShareError> {
        let mut s = self.script();
        s.calls.push("authenticate");
        if s.fail_auth {
            return Err(ShareError::Auth("bad password".to_string()));
        }
        Ok(())
    }

    async fn mount(&mut self, share: &str) -> Result<(), ShareError> {
        let mut s = self.script();
        s.calls.push("mount");
        if s.fail_mount {
            return Err(ShareError::ShareNotFound(share.to_string()));
        }
        Ok(())
    }

    fn connection_alive(&self) -> bool {
        let s = self.script();
        s.connected && !s.drop_connection
    }

    async fn folder_exists(&mut self, _folder: &str) -> Result<bool, ShareError> {
        Ok(true)
    }

    async fn list(&mut self, folder: &str) -> Result<Vec<ShareEntry>, ShareError> {
        let s = self.script();
        if s.fail_list {
            return Err(ShareError::List {
                folder: folder.to_string(),
                reason: "broken pipe".to_string(),
            });
        }
        Ok(s.entries.clone())
    }

    async fn read(&mut self, path: &str) -> Result<Vec<u8>, ShareError> {
        self.script()
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| ShareError::Read {
                path: path.to_string(),
                reason: "no such file".to_string(),
            })
    }

    async fn close_share(&mut self) -> Result<(), ShareError> {
        self.script().calls.push("close_share");
        Ok(())
    }

    async fn close_session(&mut self) -> Result<(), ShareError> {
        let mut s = self.script();
        s.calls.push("close_session");
        if s.fail_close_session {
            return Err(ShareError::Teardown {
                handle: "session",
                reason: "already gone".to_string(),
            });
        }
        Ok(())
    }

    async fn close_connection(&mut self) -> Result<(), ShareError> {
        let mut s = self.script();
        s.calls.push("close_connection");
        s.connected = false;
        Ok(())
    }

    async fn close_client(&mut self) -> Result<(), ShareError> {
        self.script().calls.push("close_client");
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceEvent {
    Render(Option<String>),
    Status(String),
}

/// Records what the display loop asked for; clock updates are ignored.
#[derive(Clone, Default)]
pub struct RecordingSurface(pub Arc<Mutex<Vec<SurfaceEvent>>>);

impl RecordingSurface {
    pub fn events(&self) -> Vec<SurfaceEvent> {
        self.0.lock().unwrap().clone()
    }
}

impl DisplaySurface for RecordingSurface {
    fn render(&mut self, image: Option<&DecodedImage>) {
        self.0
            .lock()
            .unwrap()
            .push(SurfaceEvent::Render(image.map(|i| i.name.clone())));
    }

    fn set_status_text(&mut self, text: &str) {
        self.0
            .lock()
            .unwrap()
            .push(SurfaceEvent::Status(text.to_string()));
    }

    fn set_clock_text(&mut self, _text: &str) {}
}

pub fn write_png(path: &Path) {
    image::RgbaImage::from_pixel(2, 2, image::Rgba([10, 20, 30, 255]))
        .save(path)
        .unwrap();
}

pub fn touch(path: &Path) {
    fs::write(path, b"x").unwrap();
}
