use scraper::{ElementRef, Html, Node};
use url::Url;

/// 렌더링이 끝난 페이지의 DOM 스냅샷과 그 페이지의 URL.
///
/// 상대 링크는 페이지 URL 기준으로 절대 URL로 바꿔서 돌려준다.
pub struct Page {
    document: Html,
    url: Url,
}

impl Page {
    pub fn new(html: &str, url: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            document: Html::parse_document(html),
            url: Url::parse(url)?,
        })
    }

    pub fn document(&self) -> &Html {
        &self.document
    }

    /// `href`/`src` 값을 절대 URL로 바꾼다. 빈 값이나 해석할 수 없는 값은 None.
    pub fn resolve(&self, href: &str) -> Option<String> {
        let href = href.trim();
        if href.is_empty() {
            return None;
        }
        self.url.join(href).ok().map(String::from)
    }

    /// 요소의 `attr` 속성을 절대 URL로 읽는다.
    pub fn resolve_attr(&self, el: ElementRef<'_>, attr: &str) -> Option<String> {
        el.value().attr(attr).and_then(|v| self.resolve(v))
    }
}

/// 요소의 텍스트를 모은다. `<br>`은 줄바꿈으로 바꾸고, nbsp는 공백으로 바꾼다.
pub fn block_text(el: ElementRef<'_>) -> String {
    let mut text = String::new();
    for node in el.descendants() {
        match node.value() {
            Node::Text(t) => text.push_str(t),
            Node::Element(e) if e.name() == "br" => text.push('\n'),
            _ => {}
        }
    }
    text.replace('\u{a0}', " ")
}

/// 요소의 텍스트를 모아 앞뒤 공백을 자른다.
pub fn inline_text(el: ElementRef<'_>) -> String {
    block_text(el).trim().to_string()
}
