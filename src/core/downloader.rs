use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Result;

use crate::config::Config;
use crate::core::naming;
use crate::core::retriever::{DownloadOutcome, FileRetriever};
use crate::models::{Album, Track};
use crate::sources::AlbumSource;

/// 앨범 하나를 받은 결과 집계.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadSummary {
    pub booklet_downloaded: usize,
    pub booklet_total: usize,
    pub files_downloaded: usize,
    pub files_total: usize,
    pub tracks_processed: usize,
    pub tracks_total: usize,
    pub interrupted: bool,
}

impl DownloadSummary {
    pub fn print(&self) {
        println!("\n{}", self);
    }
}

impl fmt::Display for DownloadSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== 다운로드 요약 ===")?;
        if self.booklet_total > 0 {
            writeln!(
                f,
                "북클릿 이미지: {}/{}",
                self.booklet_downloaded, self.booklet_total
            )?;
        }
        writeln!(
            f,
            "다운로드 성공: {}/{} 파일",
            self.files_downloaded, self.files_total
        )?;
        write!(
            f,
            "처리한 트랙: {}/{}",
            self.tracks_processed, self.tracks_total
        )
    }
}

/// 앨범 페이지 분석, 곡별 링크 조회, 파일 다운로드를 순서대로 진행한다.
///
/// 브라우저 세션(소스 안)과 HTTP 세션(retriever 안)은 이 값이 소유하며,
/// [`AlbumDownloader::download_album`]이 끝나면 함께 해제된다.
pub struct AlbumDownloader<A: AlbumSource> {
    source: A,
    retriever: FileRetriever,
    download_delay: Duration,
    page_delay: Duration,
    download_booklet: bool,
    interrupted: Arc<AtomicBool>,
}

impl<A: AlbumSource> AlbumDownloader<A> {
    pub fn new(
        source: A,
        retriever: FileRetriever,
        config: &Config,
        interrupted: Arc<AtomicBool>,
    ) -> Self {
        Self {
            source,
            retriever,
            download_delay: config.download_delay(),
            page_delay: config.page_delay(),
            download_booklet: config.download_booklet,
            interrupted,
        }
    }

    fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    /// 앨범 전체를 받는다. 앨범 페이지를 못 읽은 경우만 에러이고,
    /// 트랙이나 파일 단위 실패는 집계에만 반영된다.
    pub fn download_album(mut self, url: &str) -> Result<DownloadSummary> {
        println!("앨범 정보를 가져오는 중... ({})", self.source.name());
        let album = self.source.album(url)?;

        println!("앨범: {}", album.name);
        println!("트랙 {}개를 찾았습니다", album.tracks.len());
        println!("북클릿 이미지 {}개를 찾았습니다", album.booklet_images.len());

        let mut summary = DownloadSummary {
            tracks_total: album.tracks.len(),
            ..Default::default()
        };

        if self.download_booklet && !album.booklet_images.is_empty() {
            self.download_booklet_images(&album, &mut summary);
        }

        if album.tracks.is_empty() {
            println!("트랙을 찾을 수 없습니다!");
        } else if !summary.interrupted {
            self.download_tracks(&album, &mut summary);
        }

        Ok(summary)
    }

    fn download_booklet_images(&self, album: &Album, summary: &mut DownloadSummary) {
        println!("\n=== 북클릿 이미지 다운로드 ===");
        let total = album.booklet_images.len();
        summary.booklet_total = total;

        for (i, image) in album.booklet_images.iter().enumerate() {
            if self.is_interrupted() {
                summary.interrupted = true;
                return;
            }

            let filename = naming::booklet_filename(&image.filename, &image.url, i + 1);
            println!("북클릿 이미지 다운로드 {}/{}: {}", i + 1, total, filename);

            let outcome = self.retriever.download_booklet(&image.url, &album.name, &filename);
            if report(&outcome, &image.url) {
                summary.booklet_downloaded += 1;
            }
            thread::sleep(self.download_delay);
        }

        println!("북클릿 이미지 {}/{}개를 받았습니다", summary.booklet_downloaded, total);
    }

    fn download_tracks(&mut self, album: &Album, summary: &mut DownloadSummary) {
        println!("\n=== 음악 트랙 다운로드 ===");

        let discs = album.tracks_by_disc();
        let disc_count = discs.len();
        let multi_disc = disc_count > 1;

        if multi_disc {
            println!("CD {}장으로 된 앨범입니다", disc_count);
        } else {
            println!("CD 1장짜리 앨범입니다");
        }

        for (disc, tracks) in &discs {
            if multi_disc {
                println!("\n--- CD {} 처리 중 ({} 트랙) ---", disc, tracks.len());
            } else {
                println!("\n--- {} 트랙 처리 중 ---", tracks.len());
            }

            for track in tracks {
                if self.is_interrupted() {
                    summary.interrupted = true;
                    return;
                }
                summary.tracks_processed += 1;
                println!(
                    "\n트랙 처리 중 {}/{}: {}",
                    summary.tracks_processed,
                    summary.tracks_total,
                    track.label(multi_disc)
                );

                if let Err(e) = self.download_track(album, track, disc_count, summary) {
                    println!("  트랙 {} 처리 중 오류: {:#}", summary.tracks_processed, e);
                }
            }
        }
    }

    /// 트랙 하나의 상세 페이지를 읽고 찾은 URL을 모두 받는다.
    fn download_track(
        &mut self,
        album: &Album,
        track: &Track,
        disc_count: usize,
        summary: &mut DownloadSummary,
    ) -> Result<()> {
        let links = self.source.track_links(&track.page_url)?;
        if links.urls.is_empty() {
            println!("  이 트랙의 다운로드 URL을 찾을 수 없습니다");
            return Ok(());
        }

        for url in &links.urls {
            if self.is_interrupted() {
                summary.interrupted = true;
                return Ok(());
            }
            summary.files_total += 1;
            let outcome = self
                .retriever
                .download_track(url, &album.name, track, disc_count);
            if report(&outcome, url) {
                summary.files_downloaded += 1;
            }
            thread::sleep(self.download_delay);
        }

        thread::sleep(self.page_delay);
        Ok(())
    }
}

/// 결과를 한 줄로 출력하고 성공 여부를 돌려준다.
fn report(outcome: &DownloadOutcome, url: &str) -> bool {
    match outcome {
        DownloadOutcome::Downloaded { path, bytes } => {
            println!(
                "  다운로드 완료: {} ({:.2} MB)",
                display_name(path),
                *bytes as f64 / (1024.0 * 1024.0)
            );
        }
        DownloadOutcome::AlreadyExists { path } => {
            println!("  이미 있는 파일입니다: {}", display_name(path));
        }
        DownloadOutcome::Failed(e) => {
            println!("  다운로드 실패 {}: {}", url, e);
        }
    }
    outcome.is_success()
}

fn display_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
