use fibre_slru::{InsertError, SlruCache, SlruCacheBuilder};
use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc,
};
use tokio::time::{sleep, Duration};

// A simulated database or slow external service.
async fn fetch_from_database(key: i32, load_count: Arc<AtomicUsize>) -> String {
  println!(
    "--- Database: Received request for key {}. Simulating slow query...",
    key
  );
  load_count.fetch_add(1, Ordering::SeqCst);
  sleep(Duration::from_millis(500)).await;
  let value = format!("value_for_{}", key);
  println!("--- Database: Responding with '{}' for key {}.", value, key);
  value
}

// Returns the cached value, or becomes the one task that loads it.
async fn get_or_load(
  cache: &SlruCache<i32, String>,
  key: i32,
  load_count: Arc<AtomicUsize>,
) -> Result<Arc<String>, InsertError> {
  if let Some(future) = cache.lookup(&key) {
    return future.await;
  }
  let mut cookie = cache.begin_insert(key);
  if cookie.is_active() {
    let value = fetch_from_database(key, load_count).await;
    cookie.end_insert(value);
  }
  cookie.value().await
}

#[tokio::main]
async fn main() {
  let load_counter = Arc::new(AtomicUsize::new(0));

  let cache = SlruCacheBuilder::<i32, String>::default()
    .capacity(10)
    .build()
    .expect("Failed to build cache");

  println!("--- Thundering Herd Demonstration ---");
  println!("Spawning 10 tasks to request the same key '42' at once.\n");

  let mut tasks = Vec::new();
  for i in 0..10 {
    let cache = cache.clone();
    let counter = load_counter.clone();
    tasks.push(tokio::spawn(async move {
      println!("[Task {}] Requesting key 42...", i);
      let value = get_or_load(&cache, 42, counter).await.expect("load failed");
      println!("[Task {}] Received value: {}", i, value);
      assert_eq!(*value, "value_for_42");
    }));
  }

  for task in tasks {
    task.await.unwrap();
  }

  println!(
    "\nDatabase was queried {} time(s).",
    load_counter.load(Ordering::SeqCst)
  );
  assert_eq!(load_counter.load(Ordering::SeqCst), 1);
  println!("\nCache metrics: {:#?}", cache.metrics());
}
