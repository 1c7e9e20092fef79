use scraper::{ElementRef, Selector};

use crate::core::naming::last_path_segment;
use crate::core::page::{inline_text, Page};
use crate::core::{first_non_empty, Strategy};
use crate::models::{Album, BookletImage, Track, UNKNOWN_ALBUM};

const IMAGE_EXTENSIONS: [&str; 4] = [".jpg", ".jpeg", ".png", ".gif"];

const BOOKLET_STRATEGIES: [Strategy<BookletImage>; 2] = [
    Strategy {
        name: "albumImage 컨테이너",
        run: album_image_containers,
    },
    Strategy {
        name: "표 안의 이미지 링크",
        run: table_image_links,
    },
];

/// 트랙 표의 열 배치.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableLayout {
    /// `[play] [CD] [#] [Title] [Duration] ...`
    WithDisc,
    /// `[play] [#] [Title] [Duration] ...`
    WithoutDisc,
}

impl TableLayout {
    fn disc_index(self) -> Option<usize> {
        match self {
            TableLayout::WithDisc => Some(1),
            TableLayout::WithoutDisc => None,
        }
    }

    fn track_index(self) -> usize {
        match self {
            TableLayout::WithDisc => 2,
            TableLayout::WithoutDisc => 1,
        }
    }

    fn title_index(self) -> usize {
        self.track_index() + 1
    }

    fn duration_index(self) -> usize {
        self.track_index() + 2
    }
}

/// 앨범 페이지에서 앨범 이름, 트랙 목록, 북클릿 이미지를 뽑는다.
pub fn extract_album(page: &Page) -> Album {
    Album {
        name: extract_album_name(page),
        tracks: extract_tracks(page),
        booklet_images: extract_booklet_images(page),
    }
}

/// 첫 번째 `<h2>`의 텍스트. 없거나 비어 있으면 [`UNKNOWN_ALBUM`].
pub fn extract_album_name(page: &Page) -> String {
    let h2_sel = Selector::parse("h2").unwrap();
    page.document()
        .select(&h2_sel)
        .next()
        .map(inline_text)
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| {
            log::warn!("앨범 이름(<h2>)을 찾을 수 없습니다");
            UNKNOWN_ALBUM.to_string()
        })
}

/// 헤더 행에 "CD"가 들어간 `<th>`가 있으면 CD 열이 있는 표로 본다.
/// 헤더 행이 없으면 CD 열이 없는 것으로 취급한다.
pub fn detect_layout(table: ElementRef<'_>) -> TableLayout {
    let header_sel = Selector::parse("#songlist_header").unwrap();
    let th_sel = Selector::parse("th").unwrap();

    let Some(header) = table.select(&header_sel).next() else {
        log::debug!("트랙 표에 헤더 행이 없습니다. CD 열이 없는 것으로 처리합니다");
        return TableLayout::WithoutDisc;
    };

    let has_disc = header
        .select(&th_sel)
        .any(|th| inline_text(th).to_uppercase().contains("CD"));

    if has_disc {
        TableLayout::WithDisc
    } else {
        TableLayout::WithoutDisc
    }
}

/// `#songlist` 표의 각 행을 트랙으로 바꾼다. 형식이 맞지 않는 행은 건너뛴다.
pub fn extract_tracks(page: &Page) -> Vec<Track> {
    let table_sel = Selector::parse("#songlist").unwrap();
    let tr_sel = Selector::parse("tr").unwrap();

    let Some(table) = page.document().select(&table_sel).next() else {
        log::warn!("트랙 표(#songlist)를 찾을 수 없습니다");
        return Vec::new();
    };

    let layout = detect_layout(table);
    log::debug!("트랙 표 형식: {:?}", layout);

    table
        .select(&tr_sel)
        .filter_map(|row| parse_row(page, row, layout))
        .collect()
}

fn parse_row(page: &Page, row: ElementRef<'_>, layout: TableLayout) -> Option<Track> {
    let td_sel = Selector::parse("td").unwrap();
    let a_sel = Selector::parse("a").unwrap();

    let cells: Vec<ElementRef> = row.select(&td_sel).collect();
    // 헤더 행이나 꼬리 행처럼 칸이 모자란 행
    if cells.len() < 4 || cells.len() <= layout.duration_index() {
        return None;
    }

    let disc_number = match layout.disc_index() {
        Some(i) => match parse_number(&inline_text(cells[i])) {
            Some(n) => n,
            None => {
                log::debug!("CD 번호를 읽을 수 없는 행을 건너뜁니다: {:?}", inline_text(cells[i]));
                return None;
            }
        },
        None => 1,
    };

    let track_text = inline_text(cells[layout.track_index()]);
    let Some(track_number) = parse_number(&track_text) else {
        log::debug!("트랙 번호를 읽을 수 없는 행을 건너뜁니다: {:?}", track_text);
        return None;
    };

    let Some(link) = cells[layout.title_index()].select(&a_sel).next() else {
        log::debug!("제목 링크가 없는 행을 건너뜁니다 (트랙 {})", track_number);
        return None;
    };

    let raw_href = link.value().attr("href").unwrap_or_default().trim();
    if raw_href.is_empty() || raw_href == "#" {
        return None;
    }
    let page_url = page.resolve(raw_href)?;
    if page_url.ends_with('#') {
        return None;
    }

    let title = inline_text(link);
    if title.is_empty() {
        log::debug!("제목이 비어 있는 행을 건너뜁니다 (트랙 {})", track_number);
        return None;
    }

    let duration_cell = cells[layout.duration_index()];
    let duration = duration_cell
        .select(&a_sel)
        .next()
        .map(inline_text)
        .unwrap_or_else(|| inline_text(duration_cell));

    Some(Track {
        disc_number,
        track_number,
        title,
        page_url,
        duration: (!duration.is_empty()).then_some(duration),
    })
}

/// `"4"`, `"04."` 같은 번호 텍스트를 정수로 읽는다. 끝의 마침표 하나는 무시한다.
pub fn parse_number(text: &str) -> Option<u32> {
    let text = text.trim();
    let digits = text.strip_suffix('.').unwrap_or(text);
    digits.parse().ok()
}

/// 북클릿 이미지 목록. `.albumImage` 컨테이너를 먼저 보고, 없으면 표 안의 이미지 링크를 찾는다.
pub fn extract_booklet_images(page: &Page) -> Vec<BookletImage> {
    first_non_empty(page, &BOOKLET_STRATEGIES, |_| true)
}

fn album_image_containers(page: &Page) -> Vec<BookletImage> {
    let container_sel = Selector::parse(".albumImage").unwrap();
    let a_sel = Selector::parse("a").unwrap();
    let img_sel = Selector::parse("img").unwrap();

    page.document()
        .select(&container_sel)
        .filter_map(|container| {
            let url = container
                .select(&a_sel)
                .next()
                .and_then(|a| page.resolve_attr(a, "href"));
            let thumb = container
                .select(&img_sel)
                .next()
                .and_then(|img| page.resolve_attr(img, "src"));

            match (url, thumb) {
                (Some(url), Some(_)) => Some(BookletImage {
                    filename: last_path_segment(&url),
                    url,
                }),
                _ => {
                    log::debug!("링크나 썸네일이 없는 albumImage 컨테이너를 건너뜁니다");
                    None
                }
            }
        })
        .collect()
}

fn table_image_links(page: &Page) -> Vec<BookletImage> {
    let link_sel = Selector::parse("table a[href]").unwrap();

    page.document()
        .select(&link_sel)
        .filter_map(|a| page.resolve_attr(a, "href"))
        .filter(|url| {
            let name = last_path_segment(url).to_lowercase();
            IMAGE_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
        })
        .map(|url| BookletImage {
            filename: last_path_segment(&url),
            url,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://downloads.example.com/game-soundtracks/album/test-album";

    fn page(body: &str) -> Page {
        Page::new(&format!("<html><body>{}</body></html>", body), BASE).unwrap()
    }

    const NO_DISC_TABLE: &str = r##"
        <h2>Test Album OST</h2>
        <table id="songlist">
          <tr id="songlist_header"><th></th><th>#</th><th>Song Name</th><th>Time</th><th>MP3</th></tr>
          <tr>
            <td class="playlistPlay"></td>
            <td>1.</td>
            <td class="clickable-row"><a href="/game-soundtracks/album/test-album/01.%20Opening.mp3">Opening</a></td>
            <td class="clickable-row"><a href="/game-soundtracks/album/test-album/01.%20Opening.mp3">1:23</a></td>
            <td>2.1 MB</td>
          </tr>
          <tr>
            <td></td>
            <td>2.</td>
            <td><a href="/game-soundtracks/album/test-album/02.%20Field.mp3">Field</a></td>
            <td><a href="#">3:45</a></td>
            <td>4.0 MB</td>
          </tr>
          <tr id="songlist_footer"><th colspan="3">Total</th><th>5:08</th></tr>
        </table>
    "##;

    const DISC_TABLE: &str = r##"
        <table id="songlist">
          <tr id="songlist_header"><th></th><th>CD #</th><th>#</th><th>Song Name</th><th>Time</th></tr>
          <tr><td></td><td>1</td><td>1.</td><td><a href="/t/1-1">Disc One Start</a></td><td><a href="/t/1-1">1:00</a></td></tr>
          <tr><td></td><td>1</td><td>2.</td><td><a href="/t/1-2">Disc One End</a></td><td><a href="/t/1-2">2:00</a></td></tr>
          <tr><td></td><td>2</td><td>1.</td><td><a href="/t/2-1">Disc Two Start</a></td><td><a href="/t/2-1">3:00</a></td></tr>
        </table>
    "##;

    #[test]
    fn test_album_name() {
        assert_eq!(extract_album_name(&page(NO_DISC_TABLE)), "Test Album OST");
    }

    #[test]
    fn test_album_name_missing() {
        assert_eq!(extract_album_name(&page("<h1>Only h1</h1>")), UNKNOWN_ALBUM);
        assert_eq!(extract_album_name(&page("<h2>  </h2>")), UNKNOWN_ALBUM);
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("04."), Some(4));
        assert_eq!(parse_number("4"), Some(4));
        assert_eq!(parse_number(" 12. "), Some(12));
        assert_eq!(parse_number("1a"), None);
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("3.."), None);
    }

    #[test]
    fn test_layout_with_cd_header() {
        let p = page(DISC_TABLE);
        let table = p.document().select(&Selector::parse("#songlist").unwrap()).next().unwrap();
        assert_eq!(detect_layout(table), TableLayout::WithDisc);
    }

    #[test]
    fn test_layout_without_cd_header() {
        let p = page(NO_DISC_TABLE);
        let table = p.document().select(&Selector::parse("#songlist").unwrap()).next().unwrap();
        assert_eq!(detect_layout(table), TableLayout::WithoutDisc);
    }

    #[test]
    fn test_layout_without_header_row() {
        let p = page(r#"<table id="songlist"><tr><td>1</td></tr></table>"#);
        let table = p.document().select(&Selector::parse("#songlist").unwrap()).next().unwrap();
        assert_eq!(detect_layout(table), TableLayout::WithoutDisc);
    }

    #[test]
    fn test_tracks_without_disc_column() {
        let tracks = extract_tracks(&page(NO_DISC_TABLE));
        assert_eq!(tracks.len(), 2);

        assert_eq!(tracks[0].disc_number, 1);
        assert_eq!(tracks[0].track_number, 1);
        assert_eq!(tracks[0].title, "Opening");
        assert_eq!(
            tracks[0].page_url,
            "https://downloads.example.com/game-soundtracks/album/test-album/01.%20Opening.mp3"
        );
        assert_eq!(tracks[0].duration.as_deref(), Some("1:23"));

        assert_eq!(tracks[1].track_number, 2);
        assert_eq!(tracks[1].duration.as_deref(), Some("3:45"));
    }

    #[test]
    fn test_tracks_with_disc_column() {
        let tracks = extract_tracks(&page(DISC_TABLE));
        let keys: Vec<(u32, u32)> = tracks.iter().map(|t| (t.disc_number, t.track_number)).collect();
        assert_eq!(keys, vec![(1, 1), (1, 2), (2, 1)]);
        assert_eq!(tracks[2].title, "Disc Two Start");
        assert_eq!(tracks[2].page_url, "https://downloads.example.com/t/2-1");
    }

    #[test]
    fn test_bad_rows_are_skipped_not_fatal() {
        let body = r##"
            <table id="songlist">
              <tr><td></td><td>x.</td><td><a href="/t/bad">Bad Number</a></td><td>1:00</td></tr>
              <tr><td></td><td>2.</td><td>No Link</td><td>1:00</td></tr>
              <tr><td></td><td>3.</td><td><a href="#">Placeholder</a></td><td>1:00</td></tr>
              <tr><td></td><td>4.</td><td><a href="">Empty</a></td><td>1:00</td></tr>
              <tr><td></td><td>5.</td><td><a href="/t/short">Short</a></td></tr>
              <tr><td></td><td>6.</td><td><a href="/t/good">Good</a></td><td></td></tr>
            </table>
        "##;
        let tracks = extract_tracks(&page(body));
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].track_number, 6);
        assert_eq!(tracks[0].title, "Good");
        assert_eq!(tracks[0].duration, None);
    }

    #[test]
    fn test_duplicate_track_numbers_are_kept() {
        let body = r##"
            <table id="songlist">
              <tr><td></td><td>1.</td><td><a href="/t/a">A</a></td><td>1:00</td></tr>
              <tr><td></td><td>1.</td><td><a href="/t/b">B</a></td><td>1:00</td></tr>
            </table>
        "##;
        assert_eq!(extract_tracks(&page(body)).len(), 2);
    }

    #[test]
    fn test_missing_table_yields_no_tracks() {
        assert!(extract_tracks(&page("<p>nothing here</p>")).is_empty());
    }

    #[test]
    fn test_booklet_from_album_image_containers() {
        let body = r#"
            <div class="albumImage"><a href="https://img.example.com/a/Cover%20Front.jpg"><img src="/thumbs/cover.jpg"></a></div>
            <div class="albumImage"><a href="/scans/back.png"><img src="/thumbs/back.png"></a></div>
            <div class="albumImage"><img src="/thumbs/orphan.jpg"></div>
            <table><tr><td><a href="/ignored.jpg">x</a></td></tr></table>
        "#;
        let images = extract_booklet_images(&page(body));
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].url, "https://img.example.com/a/Cover%20Front.jpg");
        assert_eq!(images[0].filename, "Cover%20Front.jpg");
        assert_eq!(images[1].url, "https://downloads.example.com/scans/back.png");
        assert_eq!(images[1].filename, "back.png");
    }

    #[test]
    fn test_booklet_fallback_to_table_links() {
        let body = r#"
            <table>
              <tr><td><a href="/scans/page1.JPG">Page 1</a></td></tr>
              <tr><td><a href="/scans/page2.gif?size=full">Page 2</a></td></tr>
              <tr><td><a href="/t/01.mp3">Not an image</a></td></tr>
            </table>
            <a href="/outside.png">outside any table</a>
        "#;
        let images = extract_booklet_images(&page(body));
        let names: Vec<&str> = images.iter().map(|i| i.filename.as_str()).collect();
        assert_eq!(names, vec!["page1.JPG", "page2.gif"]);
    }

    #[test]
    fn test_no_booklet_images() {
        assert!(extract_booklet_images(&page(NO_DISC_TABLE)).is_empty());
    }

    #[test]
    fn test_extract_album() {
        let album = extract_album(&page(NO_DISC_TABLE));
        assert_eq!(album.name, "Test Album OST");
        assert_eq!(album.tracks.len(), 2);
        assert!(album.booklet_images.is_empty());
    }
}
