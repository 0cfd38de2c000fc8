//! Live `WebSocket` round trip against a bound server.

#![allow(clippy::unwrap_used)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use courier_server::{AppState, CourierConfig, serve};
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;

async fn start() -> (SocketAddr, Arc<AppState>, oneshot::Sender<()>) {
    let state = Arc::new(AppState::from_config(&CourierConfig::default()).unwrap());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let shared = Arc::clone(&state);
    tokio::spawn(async move {
        serve(listener, shared, async {
            let _ = stop_rx.await;
        })
        .await
        .unwrap();
    });
    (addr, state, stop_tx)
}

async fn wait_for_connections(state: &AppState, expected: usize) {
    for _ in 0..200 {
        if state.connection_count() == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(state.connection_count(), expected);
}

async fn next_json<S>(stream: &mut S) -> Value
where
    S: StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), stream.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        if let Message::Text(text) = frame {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

#[tokio::test]
async fn position_and_delivery_round_trip() {
    let (addr, state, stop) = start().await;
    let url = format!("ws://{addr}/ws");

    let (mut observer, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();
    let (mut agent, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();
    wait_for_connections(&state, 2).await;

    let report = json!({
        "event": "localizacaoMotorista",
        "data": {"lat": -30.0346, "lon": -51.2177, "timestamp": 42}
    });
    agent
        .send(Message::Text(report.to_string().into()))
        .await
        .unwrap();

    let update = next_json(&mut observer).await;
    assert_eq!(
        update,
        json!({
            "event": "atualizacaoLocalizacao",
            "data": {"lat": -30.0346, "lon": -51.2177, "timestamp": 42}
        })
    );

    // Validation failures come back without touching any provider.
    let request = json!({"event": "obterCoordenadas", "data": "Rua"});
    observer
        .send(Message::Text(request.to_string().into()))
        .await
        .unwrap();
    let reply = next_json(&mut observer).await;
    assert_eq!(reply["event"], "dadosEntrega");
    assert_eq!(
        reply["data"]["erro"],
        "Endereço inválido. Informe ao menos 5 caracteres."
    );

    // Closing the agent clears the routing origin.
    agent.close(None).await.unwrap();
    wait_for_connections(&state, 1).await;
    assert!(state.presence.read().await.active().is_none());

    let _ = stop.send(());
}
