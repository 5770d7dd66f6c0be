// Zenoh bridge around the motion controller
//
// Motion documents arrive on TOPIC_CMD_MOTIONS and are interpreted one at a
// time on a blocking thread (their post-delays and queue backpressure block).
// Any sample on TOPIC_CMD_STOP triggers stop-all, which also cancels the
// document being interpreted and every document still waiting behind it.
// Controller status goes out on TOPIC_STATE_MOTION at STATUS_HZ.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{info, warn};

use crate::config::{
    QUEUE_CAPACITY, STATUS_HZ, TOPIC_CMD_MOTIONS, TOPIC_CMD_STOP, TOPIC_STATE_MOTION,
};
use crate::controller::MotionController;
use crate::error::MotionError;
use crate::messages::MotionStatus;

pub async fn run(
    controller: Arc<MotionController>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    info!("Setting up publishers and subscribers...");
    let sub_motions = session.declare_subscriber(TOPIC_CMD_MOTIONS).await?;
    let sub_stop = session.declare_subscriber(TOPIC_CMD_STOP).await?;
    let pub_status = session.declare_publisher(TOPIC_STATE_MOTION).await?;

    // Documents carry the stop-all generation they arrived in
    let (documents, backlog) = mpsc::channel::<(u64, String)>(QUEUE_CAPACITY);
    let interpreter = tokio::spawn(interpret_documents(controller.clone(), backlog));

    let mut tick = interval(Duration::from_millis(1000 / STATUS_HZ));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    info!("Runtime started: status at {}Hz", STATUS_HZ);
    info!("Subscribed to: {}, {}", TOPIC_CMD_MOTIONS, TOPIC_CMD_STOP);
    info!("Publishing to: {}", TOPIC_STATE_MOTION);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Ctrl-C received, shutting down");
                break;
            }
            _ = tick.tick() => {}
        }

        // 1. Stop requests, ahead of documents received in the same tick
        let mut stop_requested = false;
        while let Ok(Some(_)) = sub_stop.try_recv() {
            stop_requested = true;
        }
        if stop_requested {
            controller.stop_all();
        }

        // 2. Hand documents to the interpreter task
        while let Ok(Some(sample)) = sub_motions.try_recv() {
            let payload = sample.payload().to_bytes();
            match std::str::from_utf8(&payload) {
                Ok(text) => {
                    let received = (controller.generation(), text.to_string());
                    if documents.try_send(received).is_err() {
                        warn!("Document backlog full, dropping motion document");
                    }
                }
                Err(e) => warn!("Motion document is not UTF-8: {}", e),
            }
        }

        // 3. Publish status
        let status_json = serde_json::to_string(&MotionStatus::from(controller.as_ref()))?;
        pub_status.put(status_json).await?;
    }

    drop(documents);
    if let Err(e) = interpreter.await {
        warn!("Document interpreter task failed: {}", e);
    }
    Ok(())
}

async fn interpret_documents(
    controller: Arc<MotionController>,
    mut backlog: mpsc::Receiver<(u64, String)>,
) {
    while let Some((generation, text)) = backlog.recv().await {
        if controller.check_generation(generation).is_err() {
            info!("Skipping motion document received before stop request");
            continue;
        }
        let controller = controller.clone();
        let interpret = move || controller.exec_document_since(&text, generation);
        match tokio::task::spawn_blocking(interpret).await {
            Ok(Ok(ids)) => info!("Motion document queued {} motions", ids.len()),
            Ok(Err(MotionError::Stopped)) => info!("Motion document cancelled by stop request"),
            Ok(Err(e)) => warn!("Motion document failed: {}", e),
            Err(e) => warn!("Motion document interpreter panicked: {}", e),
        }
    }
}
