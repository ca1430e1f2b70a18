use clap::Parser;
use clap::ValueEnum;
use fastmap::FastMap;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::SmallRng;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum KeyPattern {
    Sequential,
    Random,
    Strided,
}

#[derive(Parser, Debug)]
struct Args {
    #[arg(short = 'c', long = "target_capacity", default_value_t = 1000)]
    target_capacity: usize,

    #[arg(short = 'p', long = "pattern", value_enum, default_value_t = KeyPattern::Random)]
    pattern: KeyPattern,

    /// Fraction of inserted keys to erase before printing statistics.
    #[arg(short = 'e', long = "erase_fraction", default_value_t = 0.0)]
    erase_fraction: f64,

    #[arg(long = "seed", default_value_t = 0x5EED)]
    seed: u64,
}

fn main() {
    let args = Args::parse();

    println!(
        "Creating FastMap with target capacity: {}",
        args.target_capacity
    );

    let mut map: FastMap<u64, u64> = FastMap::with_capacity(args.target_capacity);

    println!(
        "Actual capacity: {} ({} buckets)",
        map.capacity(),
        map.bucket_count()
    );
    println!("Filling map with {:?} u64 keys...", args.pattern);

    let mut rng = SmallRng::seed_from_u64(args.seed);
    let num_values = map.capacity();
    let mut keys = Vec::with_capacity(num_values);
    for i in 0..num_values as u64 {
        let key = match args.pattern {
            KeyPattern::Sequential => i,
            KeyPattern::Random => rng.random(),
            KeyPattern::Strided => i << 12,
        };
        map.put(key, i);
        keys.push(key);
    }

    let to_erase = (keys.len() as f64 * args.erase_fraction.clamp(0.0, 1.0)) as usize;
    let mut erased = 0;
    for key in keys.iter().take(to_erase) {
        if map.erase(key) {
            erased += 1;
        }
    }

    println!("Inserted {} keys, erased {}", keys.len(), erased);
    println!(
        "Final load factor: {:.2}%",
        (map.len() as f64 / map.bucket_count() as f64) * 100.0
    );

    map.print_probe_histogram();
    map.debug_stats().print();
}
