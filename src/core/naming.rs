use std::path::{Path, PathBuf};

use url::Url;

use crate::models::Track;

const MAX_FILENAME_CHARS: usize = 200;
const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "gif"];

/// 트랙 파일 포맷. 다운로드 URL에서 판별한다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackFormat {
    Mp3,
    Flac,
}

impl TrackFormat {
    pub fn extension(self) -> &'static str {
        match self {
            TrackFormat::Mp3 => "mp3",
            TrackFormat::Flac => "flac",
        }
    }

    /// `Music/` 아래에 만드는 포맷 폴더 이름.
    pub fn folder(self) -> &'static str {
        match self {
            TrackFormat::Mp3 => "MP3",
            TrackFormat::Flac => "FLAC",
        }
    }
}

/// 파일명으로 쓸 수 있게 문자열을 정리한다.
///
/// 퍼센트 인코딩을 풀고, `<>:"/\|?*`는 `_`로 바꾸고, 제어 문자(C0, DEL, C1)는
/// 지운 뒤 공백을 하나로 합치고 앞뒤를 자른다. 최대 200자.
pub fn sanitize_filename(s: &str) -> String {
    let decoded = urlencoding::decode(s)
        .map(|d| d.into_owned())
        .unwrap_or_else(|_| String::from_utf8_lossy(&urlencoding::decode_binary(s.as_bytes())).into_owned());

    clean_name(&decoded, MAX_FILENAME_CHARS)
}

/// 퍼센트 디코딩 없이 문자 치환, 공백 정리, 길이 제한만 한다.
/// 페이지에서 읽은 텍스트(트랙 제목)는 이미 디코딩된 값이라 이쪽을 쓴다.
fn clean_name(s: &str, max_chars: usize) -> String {
    let replaced: String = s
        .chars()
        .filter(|c| !is_control(*c))
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c => c,
        })
        .collect();

    let collapsed = replaced.split_whitespace().collect::<Vec<_>>().join(" ");
    let truncated: String = collapsed.chars().take(max_chars).collect();
    truncated.trim_end().to_string()
}

fn is_control(c: char) -> bool {
    matches!(c, '\u{0}'..='\u{1f}' | '\u{7f}'..='\u{9f}')
}

/// URL 경로의 마지막 조각을 돌려준다. 쿼리와 프래그먼트는 무시한다.
pub fn last_path_segment(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .unwrap_or_default()
            .to_string(),
        Err(_) => {
            let path = url.split(['?', '#']).next().unwrap_or_default();
            path.rsplit('/').next().unwrap_or_default().to_string()
        }
    }
}

/// 다운로드 URL의 파일명 부분으로 트랙 포맷을 판별한다.
pub fn track_format(url: &str) -> Option<TrackFormat> {
    let name = last_path_segment(url).to_lowercase();
    if name.contains(".mp3") {
        Some(TrackFormat::Mp3)
    } else if name.contains(".flac") {
        Some(TrackFormat::Flac)
    } else {
        None
    }
}

/// `"NN. Title.ext"` 형식의 트랙 파일명을 만든다.
///
/// 제목만 정리하고 잘라서 번호와 확장자를 포함한 전체가 200자를 넘지 않게 한다.
pub fn track_filename(track: &Track, format: TrackFormat) -> String {
    let prefix = format!("{:02}. ", track.track_number);
    let ext = format.extension();
    let budget = MAX_FILENAME_CHARS.saturating_sub(prefix.chars().count() + ext.len() + 1);
    format!("{}{}.{}", prefix, clean_name(&track.title, budget), ext)
}

/// `<root>/<앨범>/Music/<MP3|FLAC>/[CD<n>/]<NN>. <Title>.<ext>`
pub fn track_path(
    root: &Path,
    album_name: &str,
    track: &Track,
    format: TrackFormat,
    disc_count: usize,
) -> PathBuf {
    let mut path = root
        .join(sanitize_filename(album_name))
        .join("Music")
        .join(format.folder());
    if disc_count > 1 {
        path.push(format!("CD{}", track.disc_number));
    }
    path.join(track_filename(track, format))
}

/// 북클릿 이미지의 저장 파일명. 정리 결과가 비면 `booklet_NN.<ext>`를 쓴다.
pub fn booklet_filename(filename: &str, url: &str, index: usize) -> String {
    let safe = sanitize_filename(filename);
    if !safe.is_empty() {
        return safe;
    }
    let lower = url.to_lowercase();
    let ext = IMAGE_EXTENSIONS
        .iter()
        .find(|ext| lower.contains(&format!(".{}", ext)))
        .copied()
        .unwrap_or("jpg");
    format!("booklet_{:02}.{}", index, ext)
}

/// `<root>/<앨범>/Booklet/<파일명>`
pub fn booklet_path(root: &Path, album_name: &str, filename: &str) -> PathBuf {
    root.join(sanitize_filename(album_name))
        .join("Booklet")
        .join(filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(disc: u32, number: u32, title: &str) -> Track {
        Track {
            disc_number: disc,
            track_number: number,
            title: title.to_string(),
            page_url: "https://example.com/t".to_string(),
            duration: None,
        }
    }

    #[test]
    fn test_sanitize_invalid_chars() {
        assert_eq!(sanitize_filename("Foo: Bar/Baz?.mp3"), "Foo_ Bar_Baz_.mp3");
        assert_eq!(sanitize_filename("a<b>c\"d\\e|f*g"), "a_b_c_d_e_f_g");
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let inputs = [
            "Foo: Bar/Baz?.mp3",
            "  lots   of\u{3000}space  ",
            "%E3%83%86%E3%82%B9%E3%83%88.jpg",
            "ctrl\u{1}\u{85}chars",
            "",
        ];
        for input in inputs {
            let once = sanitize_filename(input);
            assert_eq!(sanitize_filename(&once), once, "input: {:?}", input);
        }
    }

    #[test]
    fn test_sanitize_decodes_percent_encoding() {
        assert_eq!(sanitize_filename("Cover%20Front.jpg"), "Cover Front.jpg");
        assert_eq!(sanitize_filename("%E3%83%86%E3%82%B9%E3%83%88.jpg"), "テスト.jpg");
    }

    #[test]
    fn test_sanitize_strips_control_and_collapses_whitespace() {
        assert_eq!(sanitize_filename("a\u{0}b\u{9f}c"), "abc");
        assert_eq!(sanitize_filename("  a   b  "), "a b");
    }

    #[test]
    fn test_sanitize_keeps_unicode() {
        assert_eq!(sanitize_filename("아이유 - 좋은날"), "아이유 - 좋은날");
    }

    #[test]
    fn test_sanitize_truncates() {
        let long = "x".repeat(300);
        assert_eq!(sanitize_filename(&long).chars().count(), 200);

        let long_unicode = "가".repeat(250);
        assert_eq!(sanitize_filename(&long_unicode).chars().count(), 200);
    }

    #[test]
    fn test_track_format_from_url_path() {
        assert_eq!(
            track_format("https://x.com/a/01%20Song.mp3"),
            Some(TrackFormat::Mp3)
        );
        assert_eq!(
            track_format("https://x.com/a/01%20Song.FLAC?dl=1"),
            Some(TrackFormat::Flac)
        );
        assert_eq!(track_format("https://x.com/a.mp3/page"), None);
        assert_eq!(track_format("https://x.com/a/01.ogg"), None);
    }

    #[test]
    fn test_track_filename_pads_number() {
        let t = track(1, 4, "Opening");
        assert_eq!(track_filename(&t, TrackFormat::Mp3), "04. Opening.mp3");
    }

    #[test]
    fn test_track_filename_sanitizes_title() {
        let t = track(1, 12, "Battle/Boss?");
        assert_eq!(track_filename(&t, TrackFormat::Flac), "12. Battle_Boss_.flac");
    }

    #[test]
    fn test_track_filename_long_title_keeps_extension() {
        let t = track(1, 1, &"A".repeat(250));
        let name = track_filename(&t, TrackFormat::Mp3);
        assert_eq!(name.chars().count(), 200);
        assert!(name.starts_with("01. AAA"));
        assert!(name.ends_with("A.mp3"), "{}", name);

        let t = track(1, 9, &"가 ".repeat(150));
        let name = track_filename(&t, TrackFormat::Flac);
        assert!(name.chars().count() <= 200);
        assert!(name.ends_with("가.flac"), "{}", name);
    }

    #[test]
    fn test_track_filename_keeps_literal_percent() {
        let t = track(1, 3, "Rank %41 Theme");
        assert_eq!(track_filename(&t, TrackFormat::Mp3), "03. Rank %41 Theme.mp3");
    }

    #[test]
    fn test_track_filename_is_stable() {
        let t = track(1, 2, "Foo: Bar/Baz?  ");
        let once = track_filename(&t, TrackFormat::Mp3);
        assert_eq!(once, "02. Foo_ Bar_Baz_.mp3");
        assert_eq!(sanitize_filename(&once), once);
    }

    #[test]
    fn test_track_path_single_disc() {
        let t = track(1, 1, "Title");
        let path = track_path(Path::new("out"), "My: Album", &t, TrackFormat::Mp3, 1);
        assert_eq!(
            path,
            PathBuf::from("out/My_ Album/Music/MP3/01. Title.mp3")
        );
    }

    #[test]
    fn test_track_path_multi_disc() {
        let t = track(2, 7, "Title");
        let path = track_path(Path::new("out"), "Album", &t, TrackFormat::Flac, 2);
        assert_eq!(
            path,
            PathBuf::from("out/Album/Music/FLAC/CD2/07. Title.flac")
        );
    }

    #[test]
    fn test_booklet_path() {
        let path = booklet_path(Path::new("out"), "Album", "cover.jpg");
        assert_eq!(path, PathBuf::from("out/Album/Booklet/cover.jpg"));
    }

    #[test]
    fn test_booklet_filename_fallback() {
        assert_eq!(booklet_filename("cover.jpg", "https://x.com/cover.jpg", 1), "cover.jpg");
        assert_eq!(booklet_filename("", "https://x.com/scans/", 3), "booklet_03.jpg");
        assert_eq!(booklet_filename("%00", "https://x.com/img.PNG?x", 2), "booklet_02.png");
    }

    #[test]
    fn test_last_path_segment() {
        assert_eq!(last_path_segment("https://x.com/a/b/cover.jpg"), "cover.jpg");
        assert_eq!(last_path_segment("https://x.com/a/b/"), "");
        assert_eq!(last_path_segment("relative/path/x.png?q=1"), "x.png");
    }
}
