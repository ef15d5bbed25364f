// Known node / contract error substrings and the wording shown to users.
// Matching is case-insensitive; unknown errors pass through unchanged.

const KNOWN: &[(&[&str], &str)] = &[
    (
        &["insufficient funds"],
        "Insufficient funds for gas. Please add more BNB to the admin wallet.",
    ),
    (
        &["nonce too low", "replacement transaction underpriced", "already known"],
        "Transaction with same nonce already pending. Please wait for it to complete and try again.",
    ),
    (
        &["gas required exceeds allowance", "intrinsic gas too low", "out of gas"],
        "Gas limit too low. Try again with a higher gas limit.",
    ),
    (
        &["transfer amount exceeds balance", "insufficient balance"],
        "Insufficient token balance in the admin wallet.",
    ),
];

pub fn friendly_message(raw: &str) -> String {
    let lower = raw.to_ascii_lowercase();
    for (needles, message) in KNOWN {
        if needles.iter().any(|n| lower.contains(n)) {
            return (*message).to_string();
        }
    }
    raw.to_string()
}
