//! ObserveRTC observer-js 통합 데모 서버.
//!
//! WebRTC 루프백 콜 한 쌍(pc1/pc2)을 observer-js 클라이언트로 계측하는
//! 데모 페이지 한 장을 서빙하는 서버입니다. 프로세스 시작 시 환경 변수
//! 여섯 개를 읽어 페이지 템플릿의 플레이스홀더에 주입합니다.
//!
//! ```not_rust
//! __OBSERVER_SERVER_ENDPOINT__=wss://localhost:7080 cargo run
//! ```
//!
//! 📦 읽어들이는 환경 변수
//!  •	`__OBSERVER_JS__` → observer.js 스크립트 URL (기본값: 공개 배포 빌드)
//!  •	`__PORT__` → 리스닝 포트 (기본값: 8080)
//!  •	`__OBSERVER_MARKER__` → 샘플에 붙일 marker 문자열 (선택)
//!  •	`__OBSERVER_BROWSER_ID__` → 브라우저 식별자 (선택)
//!  •	`__OBSERVER_SERVER_ENDPOINT__` → 샘플을 수집할 서버 주소 (선택)
//!  •	`__OBSERVER_ACCESS_TOKEN__` → 수집 서버 인증 토큰 (선택)
//!
//! 선택 값이 설정되지 않으면 페이지에는 빈 문자열로 렌더링되고,
//! 클라이언트 스크립트는 빈 값을 "설정 안 됨"으로 처리합니다.

use std::{env, net::SocketAddr, sync::Arc};

use axum::{
    extract::State,     // 핸들러에서 공유 상태를 꺼내는 추출기
    http::StatusCode,   // HTTP 상태 코드
    response::Html,     // text/html 응답 타입
    routing::get,       // GET 라우트 헬퍼
    Router,             // 라우팅 테이블
};
use minijinja::{context, Environment}; // Jinja2 문법의 템플릿 엔진
use tokio::signal;
use tower_http::{
    services::ServeDir,  // 디렉토리 단위 정적 파일 서비스
    trace::TraceLayer,   // 요청/응답 로깅 미들웨어
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// `__OBSERVER_JS__`가 비어 있을 때 사용하는 공개 observer.js 빌드.
const DEFAULT_OBSERVER_JS: &str =
    "https://observertc.github.io/observer-js/dist/latest/observer.js";

/// `__PORT__`가 비어 있거나 숫자가 아닐 때 사용하는 포트.
const DEFAULT_PORT: u16 = 8080;

/// --- 🔧 설정

/// 템플릿에 주입되는 다섯 개의 설정 값.
/// 프로세스 시작 시 한 번 읽어서 이후에는 변경되지 않습니다.
struct ObserverConfig {
    /// observer.js를 로드할 스크립트 URL
    script_url: String,
    /// 샘플에 붙는 marker 문자열 (의미는 클라이언트 스크립트 소관)
    marker: Option<String>,
    /// 브라우저 식별자
    browser_id: Option<String>,
    /// 샘플 수집 서버의 websocket 주소
    server_endpoint: Option<String>,
    /// 수집 서버 인증 토큰
    access_token: Option<String>,
}

impl ObserverConfig {
    /// 환경 변수에서 설정을 읽습니다. 스크립트 URL만 기본값이 있고
    /// 나머지 네 값은 설정되지 않으면 `None`으로 남습니다.
    fn from_env() -> Self {
        Self {
            script_url: env::var("__OBSERVER_JS__")
                .unwrap_or_else(|_| DEFAULT_OBSERVER_JS.to_string()),
            marker: env::var("__OBSERVER_MARKER__").ok(),
            browser_id: env::var("__OBSERVER_BROWSER_ID__").ok(),
            server_endpoint: env::var("__OBSERVER_SERVER_ENDPOINT__").ok(),
            access_token: env::var("__OBSERVER_ACCESS_TOKEN__").ok(),
        }
    }
}

/// `__PORT__` 값을 포트 번호로 해석합니다.
/// 값이 없거나 u16으로 파싱되지 않으면 8080으로 떨어집니다.
fn resolve_port(raw: Option<String>) -> u16 {
    raw.and_then(|value| value.parse().ok())
        .unwrap_or(DEFAULT_PORT)
}

/// --- 📦 앱 상태 (템플릿 환경 + 설정)

struct AppState {
    env: Environment<'static>, // MiniJinja 템플릿 저장소
    observer: ObserverConfig,  // 시작 시 확정된 설정 스냅샷
}

// Having a function that produces our app makes it easy to call it from tests
// without having to create an HTTP server.
fn app(observer: ObserverConfig) -> Router {
    // 템플릿은 컴파일 타임에 바이너리로 포함시킴.
    // "index.html"이라는 이름으로 등록해야 확장자 기반 HTML 이스케이프가 적용됨
    // (Jinja2 계열 엔진의 기본 동작).
    let mut env = Environment::new();
    env.add_template("index.html", include_str!("../templates/index.html"))
        .unwrap();

    let state = Arc::new(AppState { env, observer });

    Router::new()
        // GET / → 데모 페이지 렌더링
        .route("/", get(index))
        // /static 이하의 요청은 static/ 디렉토리에서 그대로 서빙
        .nest_service("/static", ServeDir::new("static"))
        .with_state(state)
        // 요청 추적용 미들웨어
        .layer(TraceLayer::new_for_http())
}

/// --- 🚏 핸들러

/// "/" → 설정 값 다섯 개를 플레이스홀더에 채워 데모 페이지를 반환.
/// 설정되지 않은 선택 값은 빈 문자열로 들어갑니다.
async fn index(State(state): State<Arc<AppState>>) -> Result<Html<String>, StatusCode> {
    let template = state
        .env
        .get_template("index.html")
        .map_err(render_error)?;

    let rendered = template
        .render(context! {
            __observerjs__ => state.observer.script_url.as_str(),
            __observer_marker__ => state.observer.marker.as_deref().unwrap_or_default(),
            __observer_browser_id__ => state.observer.browser_id.as_deref().unwrap_or_default(),
            __observer_server_endpoint__ => state.observer.server_endpoint.as_deref().unwrap_or_default(),
            __observer_access_token__ => state.observer.access_token.as_deref().unwrap_or_default(),
        })
        .map_err(render_error)?;

    Ok(Html(rendered))
}

/// 템플릿 렌더링 실패를 500 응답으로 변환.
fn render_error(err: minijinja::Error) -> StatusCode {
    tracing::error!("failed to render index.html: {err}");
    StatusCode::INTERNAL_SERVER_ERROR
}

/// --- 🧠 main 함수

#[tokio::main]
async fn main() {
    // 로그 시스템 설정 (환경 변수 RUST_LOG 기반, 없으면 debug 레벨)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("{}=debug,tower_http=debug", env!("CARGO_CRATE_NAME")).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 설정은 여기서 한 번만 읽음
    let observer = ObserverConfig::from_env();
    let port = resolve_port(env::var("__PORT__").ok());

    tracing::debug!("serving observer.js from {}", observer.script_url);

    let app = app(observer);

    // 모든 인터페이스(0.0.0.0)에 바인딩
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();

    tracing::debug!("listening on {}", listener.local_addr().unwrap());

    // Graceful shutdown 설정 (Ctrl+C / SIGTERM)
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();
}

// 종료 신호를 대기하는 async 함수
async fn shutdown_signal() {
    // Ctrl+C (SIGINT)
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    // UNIX 환경일 경우: SIGTERM (kill 명령어 등)
    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    // Windows 등의 non-UNIX 환경에선 대기만
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    // 둘 중 먼저 오는 시그널을 기다림
    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// --- 🧪 테스트 모듈


// 🧪 테스트 방법
//
// # 기본 설정으로 실행 (8080 포트)
// cargo run
//
// # 데모 페이지 확인
// curl -i http://127.0.0.1:8080/
//
// # 정적 스크립트 확인
// curl http://127.0.0.1:8080/static/js/integration.js
//
// # 설정을 주입해서 실행
// __PORT__=9090 \
// __OBSERVER_MARKER__=demo \
// __OBSERVER_SERVER_ENDPOINT__=wss://localhost:7080 cargo run
//
// ⚠️ 서버 엔드포인트를 설정하지 않으면 페이지 자체는 뜨지만,
//    integration.js가 브라우저 콘솔에서 에러를 던집니다 (클라이언트 스크립트의 동작).
