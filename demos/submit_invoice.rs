//! Submit one invoice and poll its status.
//!
//! ```sh
//! MOADIAN_PUBLIC_KEY=authority.pem MOADIAN_PRIVATE_KEY=private.pem \
//! MOADIAN_ORG_KEY_ID=... MOADIAN_IDENTITY=A11216 MOADIAN_SELLER_TIN=14003778990 \
//!     cargo run --example submit_invoice
//! ```

use std::time::Duration;

use chrono::Utc;
use moadian::invoice::*;
use moadian::*;
use rust_decimal_macros::dec;

fn env(name: &str) -> Result<String, Box<dyn std::error::Error>> {
    std::env::var(name).map_err(|_| format!("{name} is not set").into())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let public_key = std::fs::read_to_string(env("MOADIAN_PUBLIC_KEY")?)?;
    let private_key = std::fs::read_to_string(env("MOADIAN_PRIVATE_KEY")?)?;
    let passphrase = std::env::var("MOADIAN_PASSPHRASE").ok();
    let base_url = std::env::var("MOADIAN_BASE_URL").ok();

    let mut builder = InvoiceClient::builder(
        &public_key,
        &private_key,
        &env("MOADIAN_ORG_KEY_ID")?,
        &env("MOADIAN_IDENTITY")?,
    )
    .timeout(Duration::from_secs(20));
    if let Some(passphrase) = &passphrase {
        builder = builder.passphrase(passphrase);
    }
    if let Some(base_url) = base_url {
        builder = builder.base_url(base_url);
    }
    let client = builder.build()?;

    // ── 1. Authenticate ───────────────────────────────────────────────
    println!("=== Token ===");
    let token = client.get_token()?;
    println!("  Issued at {}", token.issued_at());

    // ── 2. Build & send ───────────────────────────────────────────────
    println!("\n=== Submit ===");
    let now = Utc::now();
    let taxid = client.generate_invoice_id(now, 1)?;
    let invoice = InvoiceBuilder::new(taxid.clone(), now, env("MOADIAN_SELLER_TIN")?)
        .buyer(BuyerType::LegalEntity, "10101010101")
        .add_item(
            ItemBuilder::new("2330001234567", "Consulting", dec!(1), "1627", dec!(1000000)).build(),
        )
        .build()?;
    println!("  Tax id {taxid}, total {} Rials", invoice.header.tbill);

    let ack = match client.send_invoice(&Packet::from_invoice(&invoice)?) {
        Ok(ack) => ack,
        Err(MoadianError::RemoteRejection { code, message, .. }) => {
            println!("  Rejected [{code}]: {message}");
            return Ok(());
        }
        Err(e) if e.is_retryable() => {
            println!("  Temporary failure, retry later: {e}");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    // ── 3. Poll ───────────────────────────────────────────────────────
    println!("\n=== Inquiry ===");
    for reference in ack.reference_numbers() {
        for result in client.inquiry_by_reference_number(reference)? {
            println!(
                "  {reference}: {}",
                result.status.as_deref().unwrap_or("UNKNOWN")
            );
            for error in result.errors() {
                println!(
                    "    [{}] {}",
                    error.code().unwrap_or("-"),
                    error.message.as_deref().unwrap_or("")
                );
            }
        }
    }

    Ok(())
}
