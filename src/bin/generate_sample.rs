use std::path::PathBuf;

use anyhow::{Context, Result};

const HEADER: [&str; 16] = [
    "year",
    "make",
    "model",
    "trim",
    "body",
    "transmission",
    "vin",
    "state",
    "condition",
    "odometer",
    "color",
    "interior",
    "seller",
    "mmr",
    "sellingprice",
    "saledate",
];

/// (make, model, body, base price)
const CATALOGUE: [(&str, &str, &str, f64); 12] = [
    ("Kia", "Sorento", "SUV", 24_000.0),
    ("Kia", "Optima", "Sedan", 19_000.0),
    ("Ford", "Fusion", "Sedan", 18_000.0),
    ("Ford", "F-150", "Crew Cab", 32_000.0),
    ("Ford", "Escape", "SUV", 21_000.0),
    ("Chevrolet", "Malibu", "Sedan", 17_500.0),
    ("Chevrolet", "Silverado 1500", "Crew Cab", 30_000.0),
    ("Nissan", "Altima", "Sedan", 17_000.0),
    ("Toyota", "Camry", "Sedan", 20_000.0),
    ("Honda", "Accord", "Coupe", 21_500.0),
    ("BMW", "3 Series", "Sedan", 34_000.0),
    ("Hyundai", "Elantra", "Sedan", 14_500.0),
];

const STATES: [&str; 6] = ["ca", "fl", "tx", "pa", "ga", "oh"];
const COLORS: [&str; 6] = ["white", "black", "gray", "silver", "blue", "red"];

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn below(&mut self, n: usize) -> usize {
        (self.next_u64() % n as u64) as usize
    }

    fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    fn pick<'a>(&mut self, items: &[&'a str]) -> &'a str {
        items[self.below(items.len())]
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

/// Case and whitespace noise on a categorical value.
fn scramble(rng: &mut SimpleRng, value: &str) -> String {
    match rng.below(5) {
        0 => value.to_uppercase(),
        1 => value.to_lowercase(),
        2 => format!("  {value} "),
        _ => value.to_string(),
    }
}

fn record(rng: &mut SimpleRng, i: usize) -> Vec<String> {
    let (make, model, body, base) = CATALOGUE[rng.below(CATALOGUE.len())];
    let year = 2000 + rng.below(16) as i64;
    let age = (2015 - year) as f64;
    let mmr = (base * 0.92f64.powf(age) + rng.gauss(0.0, 800.0)).max(500.0).round();
    let price = (mmr + rng.gauss(0.0, 600.0)).max(300.0).round();
    let odometer = (age * 12_000.0 + rng.gauss(8_000.0, 4_000.0)).max(5.0).round();

    let year = if rng.chance(0.02) {
        String::new()
    } else if rng.chance(0.02) {
        // out of the plausible range
        ["1975", "2031", "1899"][rng.below(3)].to_string()
    } else {
        year.to_string()
    };
    let make = if rng.chance(0.06) {
        String::new()
    } else {
        scramble(rng, make)
    };
    let price = if rng.chance(0.02) {
        String::new()
    } else if rng.chance(0.02) {
        ["0", "-1500", "1"][rng.below(3)].to_string()
    } else {
        price.to_string()
    };
    let transmission = if rng.chance(0.1) {
        String::new()
    } else {
        scramble(rng, "automatic")
    };

    vec![
        year,
        make,
        model.to_string(),
        ["Base", "LX", "SE", "EX"][rng.below(4)].to_string(),
        scramble(rng, body),
        transmission,
        format!("sample{i:011}"),
        rng.pick(&STATES).to_string(),
        (1 + rng.below(49)).to_string(),
        odometer.to_string(),
        rng.pick(&COLORS).to_string(),
        rng.pick(&["black", "gray", "beige"]).to_string(),
        "sample dealer".to_string(),
        mmr.to_string(),
        price,
        format!("Tue Jan {:02} 2015 10:30:00 GMT-0800 (PST)", 1 + rng.below(28)),
    ]
}

fn main() -> Result<()> {
    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("sample_sales.csv"));
    let mut rng = SimpleRng::new(42);

    let mut writer = csv::Writer::from_path(&path)
        .with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(HEADER)?;

    let mut written = 0;
    for i in 0..2_000 {
        let row = record(&mut rng, i);
        writer.write_record(&row)?;
        // exact duplicates for the cleaner to drop
        if rng.chance(0.03) {
            writer.write_record(&row)?;
            written += 1;
        }
        written += 1;
    }
    writer.flush()?;

    println!("Generated {} records → {}", written, path.display());
    Ok(())
}
