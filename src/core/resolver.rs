use scraper::{ElementRef, Selector};

use crate::config::AudioFormat;
use crate::core::page::{block_text, Page};
use crate::core::{first_non_empty, Strategy};
use crate::models::{TrackLinks, UNKNOWN_SONG};

const SONG_NAME_MARKER: &str = "Song name:";

/// 다운로드 파일을 호스팅하는 도메인.
const DOWNLOAD_DOMAINS: [&str; 3] = [
    "vgmsite.com",
    "eta.vgmtreasurechest.com",
    "vgmtreasurechest.com",
];

const HOSTED_AUDIO_EXTENSIONS: [&str; 4] = [".mp3", ".flac", ".ogg", ".wav"];
const ANY_AUDIO_EXTENSIONS: [&str; 2] = [".mp3", ".flac"];

const DOWNLOAD_STRATEGIES: [Strategy<String>; 3] = [
    Strategy {
        name: "songDownloadLink 표식",
        run: marked_download_links,
    },
    Strategy {
        name: "알려진 호스트의 오디오 링크",
        run: hosted_audio_links,
    },
    Strategy {
        name: "모든 오디오 링크",
        run: any_audio_links,
    },
];

/// 곡 상세 페이지에서 곡 이름과 다운로드 URL을 찾는다.
/// URL은 `format`에 맞는 것만 남기고, 같은 URL은 한 번만 넣는다.
pub fn resolve_links(page: &Page, format: AudioFormat) -> TrackLinks {
    TrackLinks {
        song_name: extract_song_name(page),
        urls: extract_download_urls(page, format),
    }
}

/// `Song name:` 표식이 있는 문단에서 표식 뒤의 텍스트를 앞뒤 공백을 잘라 돌려준다.
pub fn extract_song_name(page: &Page) -> String {
    let p_sel = Selector::parse("p").unwrap();

    page.document()
        .select(&p_sel)
        .map(block_text)
        .find_map(|text| {
            let (_, rest) = text.split_once(SONG_NAME_MARKER)?;
            let name = rest.trim();
            (!name.is_empty()).then(|| name.to_string())
        })
        .unwrap_or_else(|| UNKNOWN_SONG.to_string())
}

pub fn extract_download_urls(page: &Page, format: AudioFormat) -> Vec<String> {
    let mut urls = first_non_empty(page, &DOWNLOAD_STRATEGIES, |url| format.accepts(url));
    let mut seen = std::collections::HashSet::new();
    urls.retain(|url| seen.insert(url.clone()));
    urls
}

/// `.songDownloadLink` 표식을 감싸는 `<a>`의 href.
fn marked_download_links(page: &Page) -> Vec<String> {
    let marker_sel = Selector::parse(".songDownloadLink").unwrap();

    page.document()
        .select(&marker_sel)
        .filter_map(|marker| {
            let link = enclosing_link(marker);
            if link.is_none() {
                log::debug!("songDownloadLink 표식이 링크 안에 있지 않습니다");
            }
            link.and_then(|a| page.resolve_attr(a, "href"))
        })
        .collect()
}

fn enclosing_link(el: ElementRef<'_>) -> Option<ElementRef<'_>> {
    if el.value().name() == "a" {
        return Some(el);
    }
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|ancestor| ancestor.value().name() == "a")
}

fn all_links(page: &Page) -> Vec<String> {
    let a_sel = Selector::parse("a[href]").unwrap();
    page.document()
        .select(&a_sel)
        .filter_map(|a| page.resolve_attr(a, "href"))
        .collect()
}

fn hosted_audio_links(page: &Page) -> Vec<String> {
    all_links(page)
        .into_iter()
        .filter(|url| {
            let lower = url.to_lowercase();
            DOWNLOAD_DOMAINS.iter().any(|d| url.contains(d))
                && HOSTED_AUDIO_EXTENSIONS.iter().any(|ext| lower.contains(ext))
        })
        .collect()
}

fn any_audio_links(page: &Page) -> Vec<String> {
    all_links(page)
        .into_iter()
        .filter(|url| {
            let lower = url.to_lowercase();
            lower.starts_with("http") && ANY_AUDIO_EXTENSIONS.iter().any(|ext| lower.contains(ext))
        })
        .collect()
}
