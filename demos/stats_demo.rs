use clap::Parser;
use robin_hash::OAHashMap;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Args {
    /// Number of slots to allocate up front.
    #[arg(short = 'c', long = "target_capacity", default_value_t = 1000)]
    target_capacity: usize,

    /// Fraction of the grow threshold to fill, above 1.0 forces resizes.
    #[arg(short = 'f', long = "fill", default_value_t = 1.0)]
    fill: f64,

    /// Remove every n-th key after filling, 0 keeps everything.
    #[arg(short = 'r', long = "remove_every", default_value_t = 0)]
    remove_every: u64,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    println!(
        "Creating OAHashMap with target capacity: {}",
        args.target_capacity
    );

    let mut map: OAHashMap<u64, u64> = OAHashMap::with_capacity(args.target_capacity);
    let grow_at = map.capacity() * 15 / 16;
    println!("Actual capacity: {} (grows at {})", map.capacity(), grow_at);

    let num_values = (grow_at as f64 * args.fill) as u64;
    println!("Filling map with {} u64 keys...", num_values);
    for key in 0..num_values {
        map.set(key, key * 2);
    }

    if args.remove_every > 0 {
        let removed = (0..num_values)
            .step_by(args.remove_every as usize)
            .filter(|key| map.remove(key).is_some())
            .count();
        println!("Removed {} keys", removed);
    }

    println!("Map holds {} keys in {} slots", map.len(), map.capacity());
    println!(
        "Final load factor: {:.2}%",
        (map.len() as f64 / map.capacity() as f64) * 100.0
    );

    map.probe_histogram().print();
    map.debug_stats().print();
}
