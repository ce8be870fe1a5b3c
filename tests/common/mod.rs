//! Shared fixtures: in-memory bundles and a registry stub.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use bookbinder::{FetchError, Registry};
use serde_json::json;
use zip::write::FileOptions;
use zip::{ZipArchive, ZipWriter};

/// `(machineName, major, minor)`
pub type Dep<'a> = (&'a str, u32, u32);

fn dep_json(deps: &[Dep<'_>]) -> serde_json::Value {
    deps.iter()
        .map(|(name, major, minor)| {
            json!({"machineName": name, "majorVersion": major, "minorVersion": minor})
        })
        .collect()
}

/// A library directory to put into a bundle
#[derive(Debug, Clone)]
pub struct Lib {
    pub name: String,
    pub major: u32,
    pub minor: u32,
    pub deps: Vec<(String, u32, u32)>,
    pub editor_deps: Vec<(String, u32, u32)>,
}

impl Lib {
    pub fn new(name: &str, major: u32, minor: u32) -> Self {
        Self {
            name: name.to_string(),
            major,
            minor,
            deps: Vec::new(),
            editor_deps: Vec::new(),
        }
    }

    pub fn dep(mut self, name: &str, major: u32, minor: u32) -> Self {
        self.deps.push((name.to_string(), major, minor));
        self
    }

    pub fn editor_dep(mut self, name: &str, major: u32, minor: u32) -> Self {
        self.editor_deps.push((name.to_string(), major, minor));
        self
    }

    pub fn directory(&self) -> String {
        format!("{}-{}.{}", self.name, self.major, self.minor)
    }

    fn library_json(&self) -> String {
        let deps: Vec<Dep<'_>> = self
            .deps
            .iter()
            .map(|(n, a, b)| (n.as_str(), *a, *b))
            .collect();
        let editor: Vec<Dep<'_>> = self
            .editor_deps
            .iter()
            .map(|(n, a, b)| (n.as_str(), *a, *b))
            .collect();

        serde_json::to_string_pretty(&json!({
            "title": self.name,
            "machineName": self.name,
            "majorVersion": self.major,
            "minorVersion": self.minor,
            "patchVersion": 3,
            "runnable": 1,
            "preloadedJs": [{"path": "js/main.js"}],
            "preloadedDependencies": dep_json(&deps),
            "editorDependencies": dep_json(&editor),
        }))
        .unwrap()
    }

    fn files(&self) -> Vec<(String, Vec<u8>)> {
        let dir = self.directory();
        vec![
            (format!("{}/library.json", dir), self.library_json().into_bytes()),
            (
                format!("{}/js/main.js", dir),
                format!("/* {} */", dir).into_bytes(),
            ),
        ]
    }
}

/// A bundle whose main library is `main`, optionally vendoring others
pub fn bundle(main: &Lib, embedded: &[&Lib]) -> Vec<u8> {
    let manifest = json!({
        "title": main.name,
        "mainLibrary": main.name,
        "preloadedDependencies": dep_json(&[(main.name.as_str(), main.major, main.minor)]),
    });

    let mut files = vec![("h5p.json".to_string(), manifest.to_string().into_bytes())];
    files.extend(main.files());
    for lib in embedded {
        files.extend(lib.files());
    }
    zip_files(&files)
}

pub fn zip_files(files: &[(String, Vec<u8>)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, bytes) in files {
        writer.start_file(name.as_str(), FileOptions::default()).unwrap();
        writer.write_all(bytes).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Write a bundle into a cache directory under `file_name`
pub fn cache_bundle(dir: &Path, file_name: &str, bytes: &[u8]) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join(file_name), bytes).unwrap();
}

/// Cache a library under its canonical name
pub fn cache_lib(dir: &Path, lib: &Lib) {
    cache_bundle(
        dir,
        &format!("{}-{}.{}.h5p", lib.name, lib.major, lib.minor),
        &bundle(lib, &[]),
    );
}

/// Entry names of an archive in order
pub fn entry_names(bytes: &[u8]) -> Vec<String> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect()
}

/// Read one archive entry
pub fn read_entry(bytes: &[u8], name: &str) -> Vec<u8> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut file = archive.by_name(name).unwrap();
    let mut out = Vec::new();
    file.read_to_end(&mut out).unwrap();
    out
}

/// Registry serving bundles from memory, 404 for anything else
#[derive(Default)]
pub struct MemoryRegistry {
    bundles: HashMap<String, Vec<u8>>,
    calls: Mutex<Vec<String>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, bytes: Vec<u8>) -> Self {
        self.bundles.insert(name.to_string(), bytes);
        self
    }

    /// Names requested so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Registry for MemoryRegistry {
    fn name(&self) -> &str {
        "memory"
    }

    async fn fetch(&self, machine_name: &str) -> Result<Vec<u8>, FetchError> {
        self.calls.lock().unwrap().push(machine_name.to_string());
        self.bundles
            .get(machine_name)
            .cloned()
            .ok_or(FetchError::Status(reqwest::StatusCode::NOT_FOUND))
    }
}
