use chart_analysis::config::RefinerConfig;
use chart_analysis::config_loader::ConfigLoader;
use chart_analysis::ingest::parse_response;
use chart_analysis::refiner::RefinementPipeline;
use log::{debug, error, info, warn};
use std::env;
use std::path::PathBuf;
use std::process;

fn main() {
    // 로그 초기화
    env_logger::init();

    info!("응답 정제 도구 시작");

    let args: Vec<String> = env::args().collect();
    debug!("커맨드 라인 인수: {:?}", args);

    if args.len() < 2 {
        error!("인수가 충분하지 않습니다. 응답 파일 경로가 필요합니다.");
        println!("사용법: {} <응답_파일> [설정_파일_경로]", args[0]);
        process::exit(2);
    }

    let response_path = PathBuf::from(&args[1]);
    let text = match std::fs::read_to_string(&response_path) {
        Ok(text) => text,
        Err(err) => {
            error!("응답 파일 읽기 실패: {} - {}", response_path.display(), err);
            println!("응답 파일을 읽을 수 없습니다: {}", response_path.display());
            process::exit(1);
        }
    };

    // 설정 파일 (지정되지 않은 경우 기본 설정)
    let config = match args.get(2).map(PathBuf::from) {
        Some(config_path) if config_path.exists() => {
            match ConfigLoader::load_refiner_config(&config_path) {
                Ok(config) => config,
                Err(err) => {
                    error!("설정 로드 실패: {}", err);
                    println!("설정 로드 실패: {}", err);
                    process::exit(1);
                }
            }
        }
        Some(config_path) => {
            warn!("설정 파일이 존재하지 않습니다: {}", config_path.display());
            println!("경고: 설정 파일이 없어 기본 설정을 사용합니다.");
            RefinerConfig::default()
        }
        None => {
            debug!("기본 설정 사용");
            RefinerConfig::default()
        }
    };

    let raw = match parse_response(&text, &config.flags) {
        Ok(raw) => raw,
        Err(err) => {
            error!("응답 수집 실패: {}", err);
            println!("응답 수집 실패: {}", err);
            process::exit(1);
        }
    };

    let refined = RefinementPipeline::new(&config).run(raw);

    match serde_json::to_string_pretty(&refined) {
        Ok(json) => println!("{}", json),
        Err(err) => {
            error!("결과 직렬화 실패: {}", err);
            process::exit(1);
        }
    }

    info!("응답 정제 도구 종료");
}
