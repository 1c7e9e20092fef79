pub mod khinsider;

use anyhow::Result;

use crate::models::{Album, TrackLinks};

/// 앨범 페이지를 제공하는 사이트 트레이트.
/// 앨범 목록 페이지와 곡 상세 페이지를 읽어 모델로 바꾼다.
pub trait AlbumSource {
    fn name(&self) -> &str;
    /// 앨범 페이지에서 앨범 정보(이름, 트랙, 북클릿)를 가져온다.
    fn album(&mut self, url: &str) -> Result<Album>;
    /// 곡 상세 페이지에서 곡 이름과 다운로드 URL을 가져온다.
    fn track_links(&mut self, url: &str) -> Result<TrackLinks>;
}
