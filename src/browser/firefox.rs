use std::net::TcpListener;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use reqwest::Method;
use serde_json::{json, Value};

use crate::browser::{BrowserBackend, BrowserError, PageSession};
use crate::config::Config;

const DRIVER_STARTUP: Duration = Duration::from_secs(10);
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// geckodriver를 띄우고 W3C WebDriver 프로토콜로 조작하는 Firefox.
pub struct Firefox;

/// WebDriver 새 세션 요청 본문.
fn session_capabilities(config: &Config) -> Value {
    let mut args = Vec::new();
    if config.headless {
        args.push("-headless");
    }
    json!({
        "capabilities": {
            "alwaysMatch": {
                "browserName": "firefox",
                "moz:firefoxOptions": {
                    "args": args,
                    "prefs": {
                        "general.useragent.override": config.user_agent,
                    },
                },
            },
        },
    })
}

fn free_port() -> Result<u16, BrowserError> {
    TcpListener::bind("127.0.0.1:0")
        .and_then(|listener| listener.local_addr())
        .map(|addr| addr.port())
        .map_err(|e| BrowserError::Launch(format!("포트를 할당할 수 없습니다: {}", e)))
}

/// drop될 때 geckodriver 프로세스를 종료한다.
struct DriverProcess(Child);

impl Drop for DriverProcess {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

impl BrowserBackend for Firefox {
    fn name(&self) -> &'static str {
        "Firefox"
    }

    fn launch(&self, config: &Config) -> Result<Box<dyn PageSession>, BrowserError> {
        let driver = which::which("geckodriver").map_err(|_| BrowserError::NotInstalled("geckodriver"))?;
        let port = free_port()?;
        log::debug!("geckodriver 실행: {} (포트 {})", driver.display(), port);

        let process = Command::new(driver)
            .arg("--port")
            .arg(port.to_string())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map(DriverProcess)
            .map_err(|e| BrowserError::Launch(format!("geckodriver 실행 실패: {}", e)))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| BrowserError::Launch(e.to_string()))?;
        let base = format!("http://127.0.0.1:{}", port);

        wait_for_driver(&client, &base)?;

        let reply = send(&client, Method::POST, &format!("{}/session", base), Some(session_capabilities(config)))
            .map_err(|e| BrowserError::Launch(e.to_string()))?;
        let session_id = reply["sessionId"]
            .as_str()
            .ok_or_else(|| BrowserError::Launch("세션 ID가 없는 응답입니다".to_string()))?
            .to_string();

        Ok(Box::new(FirefoxSession {
            client,
            session_url: format!("{}/session/{}", base, session_id),
            _process: process,
        }))
    }
}

fn wait_for_driver(client: &Client, base: &str) -> Result<(), BrowserError> {
    let deadline = Instant::now() + DRIVER_STARTUP;
    let status_url = format!("{}/status", base);
    loop {
        if let Ok(reply) = send(client, Method::GET, &status_url, None) {
            if reply["ready"].as_bool().unwrap_or(true) {
                return Ok(());
            }
        }
        if Instant::now() >= deadline {
            return Err(BrowserError::Launch("geckodriver가 응답하지 않습니다".to_string()));
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// WebDriver 명령 하나를 보내고 응답의 `value`를 돌려준다.
fn send(client: &Client, method: Method, url: &str, body: Option<Value>) -> Result<Value, BrowserError> {
    let mut request = client.request(method, url);
    if let Some(body) = body {
        request = request.json(&body);
    }

    let response = request
        .send()
        .map_err(|e| BrowserError::Session(e.to_string()))?;
    let status = response.status();
    let mut reply: Value = response
        .json()
        .map_err(|e| BrowserError::Session(e.to_string()))?;
    let value = reply.get_mut("value").map(Value::take).unwrap_or(Value::Null);

    if status.is_success() {
        Ok(value)
    } else {
        Err(BrowserError::Session(format!(
            "{}: {}",
            value["error"].as_str().unwrap_or("unknown error"),
            value["message"].as_str().unwrap_or_default()
        )))
    }
}

struct FirefoxSession {
    client: Client,
    session_url: String,
    _process: DriverProcess,
}

impl FirefoxSession {
    fn command(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value, BrowserError> {
        send(&self.client, method, &format!("{}{}", self.session_url, path), body)
    }
}

impl PageSession for FirefoxSession {
    fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
        self.command(Method::POST, "/url", Some(json!({ "url": url })))
            .map(|_| ())
    }

    fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<bool, BrowserError> {
        let deadline = Instant::now() + timeout;
        let query = json!({ "using": "css selector", "value": selector });
        loop {
            if self.command(Method::POST, "/element", Some(query.clone())).is_ok() {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    fn page_source(&mut self) -> Result<String, BrowserError> {
        let value = self.command(Method::GET, "/source", None)?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| BrowserError::Session("페이지 소스가 문자열이 아닙니다".to_string()))
    }

    fn current_url(&mut self) -> Result<String, BrowserError> {
        let value = self.command(Method::GET, "/url", None)?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| BrowserError::Session("URL이 문자열이 아닙니다".to_string()))
    }
}

impl Drop for FirefoxSession {
    fn drop(&mut self) {
        if let Err(e) = self.command(Method::DELETE, "", None) {
            log::debug!("Firefox 세션 종료 실패: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities_headless() {
        let config = Config {
            headless: true,
            user_agent: "TestAgent/1.0".to_string(),
            ..Default::default()
        };
        let caps = session_capabilities(&config);
        let options = &caps["capabilities"]["alwaysMatch"]["moz:firefoxOptions"];
        assert_eq!(options["args"], json!(["-headless"]));
        assert_eq!(options["prefs"]["general.useragent.override"], "TestAgent/1.0");
    }

    #[test]
    fn test_capabilities_windowed() {
        let caps = session_capabilities(&Config::default());
        let options = &caps["capabilities"]["alwaysMatch"]["moz:firefoxOptions"];
        assert_eq!(options["args"], json!([]));
    }

    #[test]
    fn test_free_port() {
        assert!(free_port().unwrap() > 0);
    }
}
