// End-to-end tests for queries over a StreamClient: deliveries arrive on Tokio
// tasks and wake the scope, and argument changes and teardown end the backend
// streams.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::sync::Arc;

use futures::FutureExt;
use futures::StreamExt;
use futures::future::{self, BoxFuture};
use live_query::client::stream::{QueryStream, StreamBackend, StreamClient};
use live_query::prelude::*;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio::time::{Duration, timeout};
use tokio_stream::wrappers::UnboundedReceiverStream;

type Feed = mpsc::UnboundedSender<Result<Value, ClientError>>;

/// Backend that opens one channel per watched query and keeps the sending side.
#[derive(Default)]
struct ChannelBackend {
    feeds: Mutex<Vec<(Value, Feed)>>,
}

impl ChannelBackend {
    fn feed(&self, args: &Value) -> Feed {
        self.feeds
            .lock()
            .iter()
            .rev()
            .find(|(watched, _)| watched == args)
            .map(|(_, feed)| feed.clone())
            .expect("query was watched")
    }

    fn open_feeds(&self) -> usize {
        self.feeds
            .lock()
            .iter()
            .filter(|(_, feed)| !feed.is_closed())
            .count()
    }
}

impl StreamBackend for ChannelBackend {
    fn watch(&self, _query: &FunctionRef, args: &Value) -> QueryStream {
        let (tx, rx) = mpsc::unbounded_channel();
        self.feeds.lock().push((args.clone(), tx));
        UnboundedReceiverStream::new(rx).boxed()
    }

    fn mutation(
        &self,
        _function: &FunctionRef,
        args: Value,
    ) -> BoxFuture<'static, Result<Value, ClientError>> {
        future::ready(Ok(args)).boxed()
    }

    fn action(
        &self,
        _function: &FunctionRef,
        _args: Value,
    ) -> BoxFuture<'static, Result<Value, ClientError>> {
        future::ready(Ok(Value::Null)).boxed()
    }
}

async fn wait_until(scope: &Scope, mut ready: impl FnMut() -> bool) {
    timeout(Duration::from_secs(1), async {
        while !ready() {
            scope.changed().await;
        }
    })
    .await
    .expect("condition reached within timeout");
}

async fn wait_for_closed(backend: &ChannelBackend, open: usize) {
    timeout(Duration::from_secs(1), async {
        while backend.open_feeds() != open {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("feeds closed within timeout");
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn counter() -> FunctionRef {
    FunctionRef::new("counters:get")
}

#[tokio::test]
async fn test_delivery_wakes_scope() {
    init_tracing();
    let scope = Scope::new();
    let client = Arc::new(StreamClient::new(ChannelBackend::default()));

    let query = use_query::<i64, _, _>(&scope, &client, counter(), || {
        QueryArgs::from(json!({ "name": "visits" }))
    })
    .unwrap();
    assert!(query.is_loading());

    let feed = client.backend().feed(&json!({ "name": "visits" }));
    feed.send(Ok(json!(41))).unwrap();
    wait_until(&scope, || query.data() == Some(41)).await;

    feed.send(Err(ClientError::server("gone"))).unwrap();
    wait_until(&scope, || query.error().is_some()).await;
    assert_eq!(query.data(), None);
    assert!(!query.is_loading());
}

#[tokio::test]
async fn test_args_change_ends_old_stream() {
    init_tracing();
    let scope = Scope::new();
    let client = Arc::new(StreamClient::new(ChannelBackend::default()));
    let name = Signal::new(&scope, "visits");

    let current = name.clone();
    let query = use_query_with::<i64, _, _>(
        &scope,
        &client,
        counter(),
        move || QueryArgs::from(json!({ "name": current.get() })),
        || QueryOptions::new().keep_previous_data(true),
    )
    .unwrap();

    let visits = client.backend().feed(&json!({ "name": "visits" }));
    visits.send(Ok(json!(1))).unwrap();
    wait_until(&scope, || query.data() == Some(1)).await;

    name.set("clicks");
    scope.flush();
    assert_eq!(query.data(), Some(1));
    assert!(!query.is_loading());

    wait_for_closed(client.backend(), 1).await;
    assert!(visits.send(Ok(json!(99))).is_err());

    client
        .backend()
        .feed(&json!({ "name": "clicks" }))
        .send(Ok(json!(7)))
        .unwrap();
    wait_until(&scope, || query.data() == Some(7)).await;
}

#[tokio::test]
async fn test_destroy_ends_every_stream() {
    init_tracing();
    let scope = Scope::new();
    let client = Arc::new(StreamClient::new(ChannelBackend::default()));

    let _a = use_query::<i64, _, _>(&scope, &client, counter(), || {
        QueryArgs::from(json!({ "name": "a" }))
    })
    .unwrap();
    let _b = use_query::<i64, _, _>(&scope, &client, counter(), || {
        QueryArgs::from(json!({ "name": "b" }))
    })
    .unwrap();
    assert_eq!(client.backend().open_feeds(), 2);

    scope.destroy();
    wait_for_closed(client.backend(), 0).await;
}

#[tokio::test]
async fn test_mutation_through_stream_client() {
    let client = StreamClient::new(ChannelBackend::default());

    let echoed: Value = mutation(&client, &FunctionRef::new("counters:bump"), &json!({ "by": 2 }))
        .await
        .unwrap();

    assert_eq!(echoed, json!({ "by": 2 }));
}
