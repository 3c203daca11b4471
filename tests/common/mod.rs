#![allow(dead_code)]

use std::fs;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::thread;

use markpage::fonts::FontBook;
use markpage::layout::PaginationRules;
use markpage::model::Renderable;
use markpage::pipeline::{Pipeline, Report};
use markpage::render::{CaptionLabels, RenderContext};
use markpage::sink::Body;
use markpage::style::StyleSheet;

pub const LOREM: &str = "Lorem ipsum dolor sit amet, consectetur adipiscing elit. Nam lacinia fringilla lectus, nec euismod odio convallis sed. Nunc ac libero ultricies, condimentum neque et, fermentum urna. Donec feugiat diam sed nulla rutrum, sit amet accumsan odio tempor. Sed fermentum urna. Donec feugiat diam sed nulla rutrum, sit amet accumsan odio tempor. Sed mattis. In porta convallis ipsum eget dignissim. Ut orci ante, bibendum ut lorem quis, gravida molestie neque. Nulla vitae sapien sed risus gravida elementum non eu lorem. Quisque ac turpis nisl.";

/// Scratch directory unique to this test process and `name`.
pub fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("markpage-{}-{name}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).expect("create scratch dir");
    dir
}

pub fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).expect("write test input");
    path
}

/// Local port with nothing listening on it.
pub fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    listener.local_addr().expect("addr").port()
}

/// Answer one HTTP request with `body` as a PNG.
pub fn serve_once(body: Vec<u8>) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();
    thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = stream.read(&mut buf).expect("read request");
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }
        let head = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: image/png\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        );
        stream.write_all(head.as_bytes()).expect("write head");
        stream.write_all(&body).expect("write body");
    });
    port
}

pub struct Fixture {
    pub fonts: FontBook,
    pub styles: StyleSheet,
    pub rules: PaginationRules,
    pub labels: CaptionLabels,
}

impl Fixture {
    pub fn builtin() -> Self {
        Fixture {
            fonts: FontBook::builtin(),
            styles: StyleSheet::builtin(),
            rules: PaginationRules::default(),
            labels: CaptionLabels::default(),
        }
    }

    pub fn ctx(&self) -> RenderContext<'_> {
        RenderContext {
            fonts: &self.fonts,
            styles: &self.styles,
            rules: &self.rules,
            labels: &self.labels,
        }
    }

    /// Lay `blocks` out on A4 and return the final blocks, the body and the report.
    pub fn run(&self, blocks: Vec<Renderable>, front_matter: u32) -> (Vec<Renderable>, Body, Report) {
        let mut body = Body::new(markpage::layout::PageGeometry::a4());
        let mut pipeline = Pipeline::new(blocks, &self.fonts, &self.styles)
            .with_front_matter_pages(front_matter);
        let report = pipeline.run(&mut body).expect("layout");
        (pipeline.into_blocks(), body, report)
    }
}
