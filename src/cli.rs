use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use comfy_table::{Cell, Table};
use dialoguer::{Confirm, Input, Select};

use crate::browser;
use crate::config::{self, AudioFormat, BrowserChoice, Config};
use crate::core::downloader::AlbumDownloader;
use crate::core::naming;
use crate::core::retriever::FileRetriever;
use crate::sources::khinsider::KhinsiderSource;
use crate::sources::AlbumSource;

#[derive(Parser)]
#[command(name = "vgmdl", version, about = "게임 음악 앨범 다운로더")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 자세한 로그 출력
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 앨범의 트랙과 북클릿 이미지를 다운로드
    Download {
        /// 앨범 페이지 URL
        url: String,
        /// 저장할 디렉토리
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// 받을 오디오 포맷
        #[arg(short, long, value_enum)]
        format: Option<AudioFormat>,
        #[command(flatten)]
        browser: BrowserArgs,
        /// 북클릿 이미지를 받지 않음
        #[arg(long)]
        no_booklet: bool,
        /// 파일 하나를 받은 뒤 쉬는 시간 (초)
        #[arg(long)]
        download_delay: Option<f64>,
        /// 페이지 이동 후 기다리는 시간 (초)
        #[arg(long)]
        page_delay: Option<f64>,
    },
    /// 다운로드 없이 앨범 정보만 표시
    Info {
        /// 앨범 페이지 URL
        url: String,
        #[command(flatten)]
        browser: BrowserArgs,
    },
    /// 기본 설정 편집
    Config,
}

#[derive(Args)]
pub struct BrowserArgs {
    /// 사용할 브라우저
    #[arg(short, long, value_enum)]
    pub browser: Option<BrowserChoice>,
    /// 창 없이 브라우저 실행
    #[arg(long)]
    pub headless: bool,
}

impl BrowserArgs {
    fn apply(&self, cfg: &mut Config) {
        if let Some(browser) = self.browser {
            cfg.browser = browser;
        }
        if self.headless {
            cfg.headless = true;
        }
    }
}

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Download {
            url,
            output,
            format,
            browser,
            no_booklet,
            download_delay,
            page_delay,
        } => {
            let mut cfg = config::load_config();
            browser.apply(&mut cfg);
            if let Some(output) = output {
                cfg.output_dir = output;
            }
            if let Some(format) = format {
                cfg.audio_format = format;
            }
            if no_booklet {
                cfg.download_booklet = false;
            }
            if let Some(delay) = download_delay {
                cfg.download_delay = delay;
            }
            if let Some(delay) = page_delay {
                cfg.page_delay = delay;
            }
            cmd_download(&url, &cfg)
        }
        Commands::Info { url, browser } => {
            let mut cfg = config::load_config();
            browser.apply(&mut cfg);
            cmd_info(&url, &cfg)
        }
        Commands::Config => cmd_config(),
    }
}

fn check_url(url: &str) -> Result<()> {
    let parsed = url::Url::parse(url).with_context(|| format!("올바른 URL이 아닙니다: {}", url))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        bail!("http 또는 https URL이어야 합니다: {}", url);
    }
    Ok(())
}

fn cmd_download(url: &str, cfg: &Config) -> Result<()> {
    check_url(url)?;

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = interrupted.clone();
    ctrlc::set_handler(move || {
        // 두 번째 Ctrl-C는 정리를 기다리지 않고 바로 끝낸다
        if flag.swap(true, Ordering::SeqCst) {
            std::process::exit(130);
        }
        println!("\n중단 요청을 받았습니다. 현재 파일을 마친 뒤 멈춥니다...");
    })
    .context("Ctrl-C 처리기를 등록할 수 없습니다")?;

    println!("브라우저를 준비하는 중...");
    let session = browser::launch(cfg)?;
    let source = KhinsiderSource::new(session, cfg);
    let retriever = FileRetriever::new(&cfg.output_dir, &cfg.user_agent)?;

    let summary = AlbumDownloader::new(source, retriever, cfg, interrupted)
        .download_album(url)?;
    summary.print();

    if summary.interrupted {
        bail!("사용자가 다운로드를 중단했습니다");
    }
    Ok(())
}

fn cmd_info(url: &str, cfg: &Config) -> Result<()> {
    check_url(url)?;

    let session = browser::launch(cfg)?;
    let mut source = KhinsiderSource::new(session, cfg);
    let album = source.album(url)?;

    println!("앨범: {}", album.name);

    if album.tracks.is_empty() {
        println!("트랙을 찾을 수 없습니다");
    } else {
        let mut table = Table::new();
        table.set_header(vec!["CD", "#", "제목", "길이", "상세 페이지"]);
        for track in &album.tracks {
            table.add_row(vec![
                Cell::new(track.disc_number),
                Cell::new(format!("{:02}", track.track_number)),
                Cell::new(&track.title),
                Cell::new(track.duration.as_deref().unwrap_or("-")),
                Cell::new(&track.page_url),
            ]);
        }
        println!("{table}");
    }

    if !album.booklet_images.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["파일", "URL"]);
        for (i, image) in album.booklet_images.iter().enumerate() {
            table.add_row(vec![
                Cell::new(naming::booklet_filename(&image.filename, &image.url, i + 1)),
                Cell::new(&image.url),
            ]);
        }
        println!("{table}");
    }

    println!(
        "\n총 {} 트랙 (CD {}장), 북클릿 이미지 {}개",
        album.tracks.len(),
        album.disc_count(),
        album.booklet_images.len(),
    );

    Ok(())
}

fn cmd_config() -> Result<()> {
    let mut cfg = config::load_config();

    println!("vgmdl 기본 설정");
    println!("(명령행 옵션을 주면 여기 값보다 우선합니다)\n");

    let output_dir: String = Input::new()
        .with_prompt("저장 디렉토리")
        .with_initial_text(cfg.output_dir.display().to_string())
        .interact_text()?;
    cfg.output_dir = PathBuf::from(output_dir);

    let formats = [AudioFormat::Mp3, AudioFormat::Flac, AudioFormat::Both];
    let selected = Select::new()
        .with_prompt("오디오 포맷")
        .items(&formats)
        .default(formats.iter().position(|f| *f == cfg.audio_format).unwrap_or(2))
        .interact()?;
    cfg.audio_format = formats[selected];

    let browsers = [
        BrowserChoice::Auto,
        BrowserChoice::Chrome,
        BrowserChoice::Edge,
        BrowserChoice::Firefox,
    ];
    let selected = Select::new()
        .with_prompt("브라우저")
        .items(&browsers)
        .default(browsers.iter().position(|b| *b == cfg.browser).unwrap_or(0))
        .interact()?;
    cfg.browser = browsers[selected];

    cfg.headless = Confirm::new()
        .with_prompt("창 없이(headless) 실행할까요?")
        .default(cfg.headless)
        .interact()?;

    cfg.download_booklet = Confirm::new()
        .with_prompt("북클릿 이미지도 받을까요?")
        .default(cfg.download_booklet)
        .interact()?;

    cfg.download_delay = Input::new()
        .with_prompt("다운로드 간격 (초)")
        .default(cfg.download_delay)
        .interact_text()?;

    cfg.page_delay = Input::new()
        .with_prompt("페이지 대기 시간 (초)")
        .default(cfg.page_delay)
        .interact_text()?;

    cfg.page_timeout = Input::new()
        .with_prompt("페이지 요소 대기 한도 (초)")
        .default(cfg.page_timeout)
        .interact_text()?;

    cfg.user_agent = Input::new()
        .with_prompt("User-Agent")
        .with_initial_text(cfg.user_agent.clone())
        .interact_text()?;

    let path = config::save_config(&cfg)?;
    println!("\n설정이 저장되었습니다: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_download_args() {
        let cli = Cli::try_parse_from([
            "vgmdl",
            "download",
            "https://example.com/album/x",
            "-o",
            "music",
            "-f",
            "flac",
            "-b",
            "firefox",
            "--headless",
            "--no-booklet",
        ])
        .unwrap();

        match cli.command {
            Commands::Download {
                url,
                output,
                format,
                browser,
                no_booklet,
                ..
            } => {
                assert_eq!(url, "https://example.com/album/x");
                assert_eq!(output, Some(PathBuf::from("music")));
                assert_eq!(format, Some(AudioFormat::Flac));
                assert_eq!(browser.browser, Some(BrowserChoice::Firefox));
                assert!(browser.headless);
                assert!(no_booklet);
            }
            _ => panic!("download 명령이어야 함"),
        }
    }

    #[test]
    fn test_rejects_unknown_format() {
        assert!(Cli::try_parse_from(["vgmdl", "download", "https://x.com", "-f", "wav"]).is_err());
    }

    #[test]
    fn test_browser_args_override_config() {
        let args = BrowserArgs {
            browser: Some(BrowserChoice::Chrome),
            headless: true,
        };
        let mut cfg = Config::default();
        args.apply(&mut cfg);
        assert_eq!(cfg.browser, BrowserChoice::Chrome);
        assert!(cfg.headless);
    }

    #[test]
    fn test_check_url() {
        assert!(check_url("https://downloads.example.com/album/x").is_ok());
        assert!(check_url("not a url").is_err());
        assert!(check_url("ftp://example.com/x").is_err());
    }
}
