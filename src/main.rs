mod admission;
mod config;
mod container;
mod entry_point;
mod error;
mod language;
mod repo_grader;
mod stats;
mod verdict;
mod workspace;
mod wrapper;

use actix_web::{middleware::Logger, web, App, HttpResponse, HttpServer, Result};
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;

use admission::AdmissionPool;
use config::Config;
use container::ContainerRunner;
use entry_point::NullOracle;
use language::Language;
use repo_grader::RepoGrader;
use verdict::{grade_code_submission, TestCase};

struct AppState {
    runner: Arc<ContainerRunner>,
    repo_grader: Arc<RepoGrader>,
    oracle: NullOracle,
    fallback_github_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TestCaseRequest {
    id: String,
    input: String,
    expected_output: String,
    #[serde(default)]
    time_limit_ms: i64,
    #[serde(default)]
    memory_limit_mb: i64,
    #[serde(default)]
    public: bool,
}

#[derive(Debug, Deserialize)]
struct CodeSubmissionRequest {
    language: String,
    source: String,
    #[serde(default)]
    test_cases: Vec<TestCaseRequest>,
    #[serde(default)]
    ai_entry_point_enabled: bool,
}

#[derive(Debug, Deserialize)]
struct RepoSubmissionRequest {
    repository_url: String,
    test_file: String,
    #[serde(default)]
    github_token: Option<String>,
}

async fn submit_code(
    state: web::Data<Arc<AppState>>,
    request: web::Json<CodeSubmissionRequest>,
) -> Result<HttpResponse> {
    log::info!(
        "received code submission for language: {}",
        request.language
    );

    let language = match Language::from_str(&request.language) {
        Ok(l) => l,
        Err(e) => {
            return Ok(HttpResponse::BadRequest().json(serde_json::json!({
                "error": e.to_string()
            })))
        }
    };

    let test_cases: Vec<TestCase> = request
        .test_cases
        .iter()
        .map(|tc| TestCase {
            id: tc.id.clone(),
            input: tc.input.clone(),
            expected_output: tc.expected_output.clone(),
            time_limit_ms: tc.time_limit_ms,
            memory_limit_mb: tc.memory_limit_mb,
            public: tc.public,
        })
        .collect();

    let verdict = grade_code_submission(
        language,
        &request.source,
        &test_cases,
        request.ai_entry_point_enabled,
        &state.runner,
        &state.oracle,
    )
    .await;

    match verdict {
        Ok(v) => {
            let status = actix_web::http::StatusCode::from_u16(v.http_status)
                .unwrap_or(actix_web::http::StatusCode::OK);
            Ok(HttpResponse::build(status).json(serde_json::json!({
                "results": v.results.iter().map(|r| serde_json::json!({
                    "test_case_id": r.test_case_id,
                    "passed": r.passed,
                    "solution_output": r.solution_output,
                    "input": r.input,
                    "expected_output": r.expected_output,
                    "memory_usage": r.memory_usage,
                    "time_ms": r.time_ms,
                    "cpu_usage": r.cpu_usage,
                    "memory_usage_limit": r.memory_usage_limit,
                    "time_limit": r.time_limit,
                })).collect::<Vec<_>>(),
                "score_percent": v.score_percent,
                "passed_all": v.passed_all,
                "passed_count": v.passed_count,
                "total_count": v.total_count,
                "max_cpu_percent": v.max_cpu_percent,
                "max_memory_bytes": v.max_memory_bytes,
            })))
        }
        Err(e) => {
            log::error!("code grading failed: {}", e);
            Ok(HttpResponse::build(
                actix_web::http::StatusCode::from_u16(e.status_code().as_u16())
                    .unwrap_or(actix_web::http::StatusCode::INTERNAL_SERVER_ERROR),
            )
            .json(serde_json::json!({ "error": e.to_string() })))
        }
    }
}

async fn submit_repo(
    state: web::Data<Arc<AppState>>,
    request: web::Json<RepoSubmissionRequest>,
) -> Result<HttpResponse> {
    log::info!("received repo submission for: {}", request.repository_url);

    let token = request
        .github_token
        .clone()
        .or_else(|| state.fallback_github_token.clone());

    let result = state
        .repo_grader
        .grade(
            &request.repository_url,
            request.test_file.as_bytes(),
            token.as_deref(),
        )
        .await;

    match result {
        Ok(v) => Ok(HttpResponse::Ok().json(serde_json::json!({
            "passed_count": v.passed_count,
            "failed_count": v.failed_count,
            "score_percent": v.score_percent,
            "passed_all": v.passed_all,
        }))),
        Err(e) => {
            log::error!("repo grading failed: {}", e);
            Ok(HttpResponse::InternalServerError().json(serde_json::json!({
                "error": e.to_string()
            })))
        }
    }
}

async fn health_check(docker: web::Data<bollard::Docker>) -> Result<HttpResponse> {
    let docker_reachable = docker.ping().await.is_ok();
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "contestify-judge",
        "version": env!("CARGO_PKG_VERSION"),
        "docker_reachable": docker_reachable,
    })))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    log::info!("starting contestify-judge server...");

    let config = Config::from_env();

    match std::process::Command::new("docker").arg("--version").output() {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout);
            log::info!("docker available: {}", version.trim());
        }
        _ => {
            log::error!("docker is not available or not running!");
            std::process::exit(1);
        }
    }

    let docker = bollard::Docker::connect_with_local_defaults()
        .expect("failed to connect to the Docker Engine API");

    let admission = AdmissionPool::new(config.admission_pool_size);
    let runner = Arc::new(ContainerRunner::new(docker.clone(), admission));
    let repo_grader = Arc::new(RepoGrader::new(docker.clone()));

    let fallback_github_token = config.github_access_token.clone();
    let state = Arc::new(AppState {
        runner,
        repo_grader,
        oracle: NullOracle,
        fallback_github_token,
    });

    log::info!("server starting on {}", config.bind_addr);
    let bind_addr = config.bind_addr.clone();

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .app_data(web::Data::new(docker.clone()))
            .wrap(Logger::default())
            .route("/health", web::get().to(health_check))
            .route("/submissions/code", web::post().to(submit_code))
            .route("/submissions/repo", web::post().to(submit_repo))
    })
    .bind(&bind_addr)?
    .run()
    .await
}
