pub mod chromium;
pub mod firefox;

use std::time::Duration;

use thiserror::Error;

use crate::config::{BrowserChoice, Config};

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("사용할 수 있는 브라우저가 없습니다")]
    NoBrowser,

    #[error("{0} 실행 파일을 찾을 수 없습니다")]
    NotInstalled(&'static str),

    #[error("브라우저 실행 실패: {0}")]
    Launch(String),

    #[error("브라우저 조작 실패: {0}")]
    Session(String),
}

/// 페이지를 렌더링하는 브라우저 세션. 세션을 drop하면 브라우저가 종료된다.
pub trait PageSession {
    fn navigate(&mut self, url: &str) -> Result<(), BrowserError>;
    /// CSS 선택자에 맞는 요소가 나타날 때까지 기다린다. 시간 안에 나타나면 true.
    fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<bool, BrowserError>;
    /// 현재 DOM을 HTML로 직렬화한다.
    fn page_source(&mut self) -> Result<String, BrowserError>;
    /// 리다이렉트 이후의 현재 URL.
    fn current_url(&mut self) -> Result<String, BrowserError>;
}

impl<T: PageSession + ?Sized> PageSession for Box<T> {
    fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
        (**self).navigate(url)
    }

    fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<bool, BrowserError> {
        (**self).wait_for(selector, timeout)
    }

    fn page_source(&mut self) -> Result<String, BrowserError> {
        (**self).page_source()
    }

    fn current_url(&mut self) -> Result<String, BrowserError> {
        (**self).current_url()
    }
}

/// 브라우저 종류 하나. 설정에 맞춰 브라우저를 띄우고 세션을 돌려준다.
pub trait BrowserBackend {
    fn name(&self) -> &'static str;
    fn launch(&self, config: &Config) -> Result<Box<dyn PageSession>, BrowserError>;
}

/// 선택에 해당하는 백엔드 목록. `Auto`는 Chrome, Edge, Firefox 순서.
pub fn backends(choice: BrowserChoice) -> Vec<Box<dyn BrowserBackend>> {
    let chrome = || Box::new(chromium::Chromium::chrome()) as Box<dyn BrowserBackend>;
    let edge = || Box::new(chromium::Chromium::edge()) as Box<dyn BrowserBackend>;
    let firefox = || Box::new(firefox::Firefox) as Box<dyn BrowserBackend>;

    match choice {
        BrowserChoice::Auto => vec![chrome(), edge(), firefox()],
        BrowserChoice::Chrome => vec![chrome()],
        BrowserChoice::Edge => vec![edge()],
        BrowserChoice::Firefox => vec![firefox()],
    }
}

/// 설정된 브라우저를 띄운다. 여러 후보가 있으면 처음으로 성공한 것을 쓴다.
pub fn launch(config: &Config) -> Result<Box<dyn PageSession>, BrowserError> {
    launch_first(&backends(config.browser), config)
}

fn launch_first(
    backends: &[Box<dyn BrowserBackend>],
    config: &Config,
) -> Result<Box<dyn PageSession>, BrowserError> {
    for backend in backends {
        log::info!("{} 실행을 시도합니다...", backend.name());
        match backend.launch(config) {
            Ok(session) => {
                log::info!("{} 브라우저를 사용합니다", backend.name());
                return Ok(session);
            }
            Err(e) => log::warn!("{} 실행 실패: {}", backend.name(), e),
        }
    }
    Err(BrowserError::NoBrowser)
}
