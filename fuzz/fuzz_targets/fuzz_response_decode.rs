#![no_main]

use libfuzzer_sys::fuzz_target;
use moadian::api::{EconomicCodeInfo, FiscalInfo, InquiryResult, SubmissionAck, SyncResponse};

fuzz_target!(|data: &[u8]| {
    // Errors are fine, panics are bugs.
    let _ = serde_json::from_slice::<SubmissionAck>(data);
    let _ = serde_json::from_slice::<SyncResponse<Vec<InquiryResult>>>(data);
    let _ = serde_json::from_slice::<SyncResponse<EconomicCodeInfo>>(data);
    let _ = serde_json::from_slice::<SyncResponse<FiscalInfo>>(data);
    if let Ok(results) = serde_json::from_slice::<Vec<InquiryResult>>(data) {
        for result in &results {
            let _ = result.errors();
        }
    }
});
