use chrono::Utc;
use moadian::*;

fn main() {
    let identity = std::env::args().nth(1).unwrap_or_else(|| "A11216".into());
    let sequence: u64 = std::env::args()
        .nth(2)
        .and_then(|s| s.parse().ok())
        .unwrap_or(1);

    // ── 1. Generate ───────────────────────────────────────────────────
    println!("=== Generate ===");
    let ids = match InvoiceIdGenerator::new(&identity) {
        Ok(ids) => ids,
        Err(e) => {
            println!("  Invalid identity: {e}");
            return;
        }
    };
    let id = match ids.generate(Utc::now(), sequence) {
        Ok(id) => id,
        Err(e) => {
            println!("  Cannot generate: {e}");
            return;
        }
    };
    println!("  Tax id:        {id}");
    println!("  Identity:      {}", id.identity());
    println!("  Days (epoch):  {}", id.days_since_epoch());
    println!("  Serial (inno): {}", id.sequence_hex());

    // ── 2. Verify ─────────────────────────────────────────────────────
    println!("\n=== Verify ===");
    println!("  {id}: {}", ids.verify(id.as_str()));

    let mut tampered = id.as_str().to_string();
    let check = tampered.pop().unwrap_or('0');
    tampered.push(if check == '9' { '0' } else { '9' });
    println!("  {tampered}: {}", ids.verify(&tampered));
}
