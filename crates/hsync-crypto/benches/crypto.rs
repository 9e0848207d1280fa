use hsync_core::{Algorithm, HistoryItem};
use hsync_crypto::{decrypt, encrypt, KdfParams};

const KEY: &str = "Bench-Key-2024";

// Iteration count held low so the cipher path dominates
const PARAMS: KdfParams = KdfParams { iterations: 1_000 };

fn make_items(count: usize) -> Vec<HistoryItem> {
    (0..count)
        .map(|i| HistoryItem {
            id: i.to_string(),
            url: format!("https://example.com/page/{i}"),
            title: Some(format!("Page {i}")),
            last_visit_time: 1_700_000_000_000 + i as i64,
            visit_count: (i % 17) as u32,
        })
        .collect()
}

#[divan::bench(args = [10, 1000, 10000])]
fn bench_encrypt_gcm(bencher: divan::Bencher, count: usize) {
    let items = make_items(count);
    bencher.bench(|| {
        encrypt(
            divan::black_box(&items),
            KEY,
            Algorithm::Aes256Gcm,
            None,
            &PARAMS,
        )
        .unwrap()
    });
}

#[divan::bench(args = [10, 1000, 10000])]
fn bench_decrypt_gcm(bencher: divan::Bencher, count: usize) {
    let blob = encrypt(&make_items(count), KEY, Algorithm::Aes256Gcm, None, &PARAMS).unwrap();
    bencher.bench(|| decrypt(divan::black_box(&blob), KEY, Algorithm::Aes256Gcm, &PARAMS).unwrap());
}

#[divan::bench(args = [Algorithm::Aes256Cbc, Algorithm::Aes256Ctr, Algorithm::ChaCha20Poly1305])]
fn bench_roundtrip_1000(bencher: divan::Bencher, algorithm: Algorithm) {
    let items = make_items(1000);
    bencher.bench(|| {
        let blob = encrypt(&items, KEY, algorithm, None, &PARAMS).unwrap();
        decrypt(&blob, KEY, algorithm, &PARAMS).unwrap()
    });
}

#[divan::bench]
fn bench_master_key_default_params() -> hsync_crypto::MasterKey {
    let password = secrecy::SecretString::from("bench master password");
    hsync_crypto::derive_master_key(&password, &[0u8; 16], &KdfParams::default())
}

fn main() {
    divan::main();
}
