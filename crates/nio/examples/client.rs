use std::sync::Arc;

use http::Method;
use micro_nio::client::{ClientConnection, JobQueue};
use micro_nio::config::EngineConfig;
use micro_nio::exchange::{Job, JobEntity};
use tokio::net::TcpStream;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// Runs a batch of jobs against `examples/server.rs` over two connections.
#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let mut jobs: Vec<Job> = (1..=10).map(|count| Job::new("abc", count * 100)).collect();
    jobs.push(Job::builder("up", 5000).method(Method::POST).entity(JobEntity::Chunked).expect_continue(true).build());
    jobs.push(Job::builder("head", 10).method(Method::HEAD).build());
    let queue = Arc::new(jobs.iter().cloned().collect::<JobQueue>());

    let mut connections = Vec::new();
    for _ in 0..2 {
        let queue = Arc::clone(&queue);
        connections.push(tokio::spawn(async move {
            let stream = TcpStream::connect("127.0.0.1:8080").await?;
            let (reader, writer) = stream.into_split();
            let mut connection = ClientConnection::new(reader, writer, EngineConfig::default());
            connection.run(&queue).await.map_err(std::io::Error::other)
        }));
    }

    for connection in connections {
        match connection.await {
            Ok(Ok(executed)) => info!(executed, "connection finished"),
            Ok(Err(e)) => error!(cause = %e, "connection failed"),
            Err(e) => error!(cause = %e, "connection task failed"),
        }
    }

    for job in &jobs {
        let matches = job.result().is_some_and(|result| result == job.expected());
        info!(uri = %job.uri(), method = %job.method(), state = ?job.status(), matches, "job");
    }
}
