use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;

use crate::core::naming;
use crate::models::Track;

const CHUNK_SIZE: usize = 8192;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("알 수 없는 파일 포맷입니다: {0}")]
    UnknownFormat(String),

    #[error("요청 실패: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// 파일 하나를 받은 결과.
#[derive(Debug)]
pub enum DownloadOutcome {
    Downloaded { path: PathBuf, bytes: u64 },
    /// 이미 같은 경로에 파일이 있어 요청하지 않았다.
    AlreadyExists { path: PathBuf },
    Failed(DownloadError),
}

impl DownloadOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, DownloadOutcome::Failed(_))
    }
}

/// 결정적인 경로로 파일을 받는다. 이미 있는 파일은 다시 받지 않는다.
pub struct FileRetriever {
    client: reqwest::blocking::Client,
    output_dir: PathBuf,
}

impl FileRetriever {
    pub fn new(output_dir: &Path, user_agent: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(user_agent)
            .build()
            .context("다운로드용 HTTP 클라이언트 생성에 실패했습니다")?;

        Ok(Self {
            client,
            output_dir: output_dir.to_path_buf(),
        })
    }

    /// 트랙 파일을 `<output>/<앨범>/Music/<FORMAT>/[CD<n>/]NN. Title.ext`에 받는다.
    /// 포맷을 알 수 없는 URL은 요청 없이 실패로 처리한다.
    pub fn download_track(
        &self,
        url: &str,
        album_name: &str,
        track: &Track,
        disc_count: usize,
    ) -> DownloadOutcome {
        let Some(format) = naming::track_format(url) else {
            return DownloadOutcome::Failed(DownloadError::UnknownFormat(url.to_string()));
        };
        let path = naming::track_path(&self.output_dir, album_name, track, format, disc_count);
        self.retrieve(url, path)
    }

    /// 북클릿 이미지를 `<output>/<앨범>/Booklet/<filename>`에 받는다.
    /// `filename`은 [`naming::booklet_filename`]으로 정리된 이름이어야 한다.
    pub fn download_booklet(&self, url: &str, album_name: &str, filename: &str) -> DownloadOutcome {
        let path = naming::booklet_path(&self.output_dir, album_name, filename);
        self.retrieve(url, path)
    }

    fn retrieve(&self, url: &str, path: PathBuf) -> DownloadOutcome {
        if path.exists() {
            log::debug!("이미 있는 파일이라 건너뜁니다: {}", path.display());
            return DownloadOutcome::AlreadyExists { path };
        }

        match self.fetch(url, &path) {
            Ok(bytes) => DownloadOutcome::Downloaded { path, bytes },
            Err(e) => {
                log::debug!("다운로드 실패 {}: {}", url, e);
                DownloadOutcome::Failed(e)
            }
        }
    }

    /// 응답 본문을 `.part` 파일에 나눠 쓴 뒤 최종 경로로 옮긴다.
    fn fetch(&self, url: &str, path: &Path) -> Result<u64, DownloadError> {
        let mut response = self.client.get(url).send()?.error_for_status()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| DownloadError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let part = part_path(path);
        let written = write_chunks(&mut response, &part).and_then(|bytes| {
            fs::rename(&part, path)?;
            Ok(bytes)
        });

        written.map_err(|source| {
            let _ = fs::remove_file(&part);
            DownloadError::Io {
                path: path.to_path_buf(),
                source,
            }
        })
    }
}

fn write_chunks(reader: &mut impl Read, path: &Path) -> io::Result<u64> {
    let mut file = File::create(path)?;
    let mut buf = [0u8; CHUNK_SIZE];
    let mut total = 0u64;
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n])?;
        total += n as u64;
    }
    file.flush()?;
    Ok(total)
}

fn part_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    path.with_file_name(name)
}
