use fibre_slru::SlruCacheBuilder;

fn main() {
  // Capacity counts bytes here, so the weigher reports each value's length.
  let cache = SlruCacheBuilder::<String, Vec<u8>>::default()
    .capacity(1_000)
    .younger_size_fraction(0.25)
    .weigher(|value: &Vec<u8>| value.len() as u64)
    .build()
    .expect("Failed to build cache");

  println!("Inserting 'key1' with a 100 byte value.");
  let mut cookie = cache.begin_insert("key1".to_string());
  if cookie.is_active() {
    cookie.end_insert(vec![1u8; 100]);
  }

  match cache.find("key1") {
    Some(value) => println!("Found value for key1 ({} bytes)", value.len()),
    None => println!("Value for key1 not found."),
  }
  println!("Segment of key1: {:?}", cache.segment("key1"));

  println!("\nFilling the cache with a one-off scan of 50 keys...");
  for i in 0..50 {
    let mut cookie = cache.begin_insert(format!("scan{i}"));
    if cookie.is_active() {
      cookie.end_insert(vec![0u8; 40]);
    }
  }

  // key1 was accessed twice, so it sits in the older segment and survives.
  match cache.find("key1") {
    Some(_) => println!("key1 survived the scan."),
    None => println!("key1 was evicted."),
  }
  println!(
    "Weight: {} / {} (younger {}, older {})",
    cache.weight(),
    cache.capacity(),
    cache.younger_weight(),
    cache.older_weight()
  );

  println!("\nShrinking the cache to 200 bytes.");
  cache.reconfigure(200, 0.5).expect("valid limits");
  println!("Weight after reconfigure: {}", cache.weight());

  println!("\nCache metrics: {:#?}", cache.metrics());
}
