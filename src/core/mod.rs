pub mod downloader;
pub mod extractor;
pub mod naming;
pub mod page;
pub mod resolver;
pub mod retriever;

use page::Page;

/// 페이지에서 후보 목록을 찾는 방법 하나.
pub struct Strategy<T> {
    pub name: &'static str,
    pub run: fn(&Page) -> Vec<T>,
}

/// 전략을 순서대로 실행해서 `accept`를 통과한 후보가 하나라도 나온 첫 결과를 돌려준다.
/// 모든 전략이 비면 빈 목록.
pub fn first_non_empty<T>(
    page: &Page,
    strategies: &[Strategy<T>],
    accept: impl Fn(&T) -> bool,
) -> Vec<T> {
    for strategy in strategies {
        let found: Vec<T> = (strategy.run)(page).into_iter().filter(|c| accept(c)).collect();
        if !found.is_empty() {
            log::debug!("{}: {}개 후보", strategy.name, found.len());
            return found;
        }
        log::debug!("{}: 후보 없음", strategy.name);
    }
    Vec::new()
}
