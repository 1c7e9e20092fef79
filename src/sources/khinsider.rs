use std::time::Duration;

use anyhow::{Context, Result};

use crate::browser::PageSession;
use crate::config::{AudioFormat, Config};
use crate::core::page::Page;
use crate::core::{extractor, resolver};
use crate::models::{Album, TrackLinks};
use crate::sources::AlbumSource;

/// 앨범 페이지에서 렌더링 완료를 판단하는 요소.
const ALBUM_READY: &str = "#songlist";
/// 곡 상세 페이지에서 렌더링 완료를 판단하는 요소.
const TRACK_READY: &str = ".songDownloadLink";

/// KHInsider 스타일 앨범 사이트. 브라우저로 페이지를 렌더링한 뒤 DOM을 파싱한다.
pub struct KhinsiderSource<S: PageSession> {
    session: S,
    format: AudioFormat,
    page_delay: Duration,
    page_timeout: Duration,
}

impl<S: PageSession> KhinsiderSource<S> {
    pub fn new(session: S, config: &Config) -> Self {
        Self {
            session,
            format: config.audio_format,
            page_delay: config.page_delay(),
            page_timeout: config.page_timeout(),
        }
    }

    /// 페이지로 이동해서 `ready` 요소를 기다리고, 정해진 시간만큼 더 쉰 뒤 DOM을 읽는다.
    fn load(&mut self, url: &str, ready: &str) -> Result<Page> {
        self.session
            .navigate(url)
            .with_context(|| format!("페이지를 열 수 없습니다: {}", url))?;

        if !self.session.wait_for(ready, self.page_timeout)? {
            log::warn!("{}에서 {} 요소가 나타나지 않았습니다", url, ready);
        }
        std::thread::sleep(self.page_delay);

        let html = self
            .session
            .page_source()
            .context("페이지 내용을 읽을 수 없습니다")?;
        let current = self.session.current_url().unwrap_or_else(|e| {
            log::debug!("현재 URL을 읽을 수 없어 요청 URL을 씁니다: {}", e);
            url.to_string()
        });

        Page::new(&html, &current)
            .or_else(|_| Page::new(&html, url))
            .with_context(|| format!("올바른 URL이 아닙니다: {}", url))
    }
}

impl<S: PageSession> AlbumSource for KhinsiderSource<S> {
    fn name(&self) -> &str {
        "KHInsider"
    }

    fn album(&mut self, url: &str) -> Result<Album> {
        let page = self.load(url, ALBUM_READY)?;
        Ok(extractor::extract_album(&page))
    }

    fn track_links(&mut self, url: &str) -> Result<TrackLinks> {
        let page = self.load(url, TRACK_READY)?;
        let links = resolver::resolve_links(&page, self.format);
        log::debug!("곡 이름: {} (URL {}개)", links.song_name, links.urls.len());
        Ok(links)
    }
}
