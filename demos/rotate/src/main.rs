use std::sync::Arc;
use griddle::{
    Batcher, BatchKey, GriddleError, PredictOptions, RoutineError, RoutineRegistry, Scheduler, ServiceConfig,
    SharedRoutine, SyncRoutine, TaskRegistry,
};
use serde_json::{json, Value};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Rows of grayscale pixels.
type Image = Vec<Vec<u8>>;

const CONFIG: &str = r#"
routine: rotate
routine_config:
  invert: false
scheduler:
  poll_interval_ms: 50
  max_batch_size: 16
"#;

fn check(image: &Image) -> Result<(), RoutineError> {
    if image.is_empty() || image[0].is_empty() {
        return Err(RoutineError::failed("ValueError", "image has no pixels"));
    }
    if image.iter().any(|row| row.len() != image[0].len()) {
        return Err(RoutineError::failed("ValueError", "ragged image rows"));
    }
    Ok(())
}

fn render(image: Image, options: PredictOptions) -> Value {
    if options.as_json {
        json!({ "height": image.len(), "width": image[0].len(), "pixels": image })
    } else {
        json!(image)
    }
}

fn rotate_routine(config: &Value) -> Result<SharedRoutine<Image, Value>, RoutineError> {
    let invert = config.get("invert").and_then(Value::as_bool).unwrap_or(false);
    let shade = move |pixel: u8| if invert { u8::MAX - pixel } else { pixel };

    let routine = SyncRoutine::new(move |batch: &[Image], options| {
        let mut outputs = Vec::with_capacity(batch.len());
        for image in batch {
            check(image)?;
            let image: Image = image.iter().map(|row| row.iter().map(|p| shade(*p)).collect::<Vec<u8>>()).collect();
            outputs.push(render(image, options));
        }
        Ok(outputs)
    })
        .with_entry_point("rotate_180", move |batch: &[Image], options| {
            let mut outputs = Vec::with_capacity(batch.len());
            for image in batch {
                check(image)?;
                let rotated: Image = image
                    .iter()
                    .rev()
                    .map(|row| row.iter().rev().map(|p| shade(*p)).collect::<Vec<u8>>())
                    .collect();
                outputs.push(render(rotated, options));
            }
            Ok(outputs)
        })
        .with_response_format();
    Ok(Arc::new(routine))
}

#[tokio::main]
async fn main() -> griddle::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => ServiceConfig::from_path(path)?,
        None => ServiceConfig::from_yaml_str(CONFIG)?,
    };

    let mut registry = RoutineRegistry::new();
    registry.register("rotate", rotate_routine);
    info!(available = ?registry.names(), selected = %config.routine, "registered routines");

    let routine = registry.resolve(&config)?;
    let scheduler = Arc::new(Scheduler::start(routine, config.scheduler.clone())?);

    let requests: [(&str, Option<&str>, Image); 5] = [
        ("/rotate_180", Some("application/json"), vec![vec![1, 2], vec![3, 4]]),
        ("/rotate_180", None, vec![vec![5, 6, 7]]),
        ("/rotate_180", Some("application/json"), vec![]),
        ("/predict", None, vec![vec![8], vec![9]]),
        ("/rotate_180", Some("application/json"), vec![vec![10, 11, 12], vec![13, 14, 15]]),
    ];

    let handles = requests
        .into_iter()
        .enumerate()
        .map(|(index, (path, accept, image))| {
            let scheduler = scheduler.clone();
            tokio::spawn(async move {
                match BatchKey::from_request(path, accept, true) {
                    Ok(key) => {
                        println!("Index {} submitted on {}", index, key);
                        scheduler.predict(image, key).await
                    }
                    Err(e) => Err(e),
                }
            })
        })
        .collect::<Vec<_>>();

    for (index, handle) in futures::future::join_all(handles).await.into_iter().enumerate() {
        match handle {
            Ok(Ok(output)) => println!("Index {} -> {}", index, output),
            Ok(Err(e)) => println!("Index {} failed (errno {}, status {}): {}", index, e.errno(), e.http_status(), e),
            Err(e) => println!("Err joining handle: {:?}", e),
        }
    }

    // fire-and-poll style request
    let tasks = TaskRegistry::new();
    let id = tasks.defer(scheduler.submit(vec![vec![0, 255]], BatchKey::new("rotate_180", false)));
    println!("Deferred task {}", id);
    let output = loop {
        match tasks.poll(&id).await.into_result() {
            Err(GriddleError::TaskNotDone) => tokio::time::sleep(std::time::Duration::from_millis(10)).await,
            other => break other?,
        }
    };
    println!("Task {} -> {}", id, output);

    scheduler.stop().await;
    Ok(())
}
