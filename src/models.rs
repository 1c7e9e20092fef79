use std::collections::BTreeMap;

/// 앨범 이름을 찾지 못했을 때 사용하는 이름.
pub const UNKNOWN_ALBUM: &str = "Unknown Album";
/// 곡 상세 페이지에서 곡 이름을 찾지 못했을 때 사용하는 이름.
pub const UNKNOWN_SONG: &str = "Unknown Song";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    /// 디스크 번호. CD 열이 없는 목록에서는 1.
    pub disc_number: u32,
    pub track_number: u32,
    pub title: String,
    /// 곡 상세 페이지의 절대 URL.
    pub page_url: String,
    pub duration: Option<String>,
}

impl Track {
    /// 진행 상황 출력용 라벨. 여러 CD 앨범이면 `CD2-03. Title`, 아니면 `03. Title`.
    pub fn label(&self, multi_disc: bool) -> String {
        if multi_disc {
            format!(
                "CD{}-{:02}. {}",
                self.disc_number, self.track_number, self.title
            )
        } else {
            format!("{:02}. {}", self.track_number, self.title)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookletImage {
    pub url: String,
    /// URL 마지막 경로 조각에서 얻은 파일명 (아직 정리되지 않은 상태).
    pub filename: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Album {
    pub name: String,
    pub tracks: Vec<Track>,
    pub booklet_images: Vec<BookletImage>,
}

impl Album {
    /// 디스크 번호별로 트랙을 묶는다. 키는 오름차순, 각 묶음은 원래 순서를 유지한다.
    pub fn tracks_by_disc(&self) -> BTreeMap<u32, Vec<&Track>> {
        let mut discs: BTreeMap<u32, Vec<&Track>> = BTreeMap::new();
        for track in &self.tracks {
            discs.entry(track.disc_number).or_default().push(track);
        }
        discs
    }

    pub fn disc_count(&self) -> usize {
        self.tracks_by_disc().len()
    }
}

/// 곡 상세 페이지에서 얻은 표시 이름과 다운로드 후보 URL.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TrackLinks {
    pub song_name: String,
    pub urls: Vec<String>,
}
