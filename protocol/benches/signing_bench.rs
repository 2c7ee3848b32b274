// Signing & verification benchmarks for Human Pass.
//
// Covers Ed25519 keypair generation, raw signing and verification, address
// derivation, and signed envelope round trips at various body sizes.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use humanpass_protocol::crypto::keys::PassKeypair;
use humanpass_protocol::envelope::SignedEnvelope;
use humanpass_protocol::identity::Address;

fn bench_keypair_generation(c: &mut Criterion) {
    c.bench_function("ed25519/keypair_generate", |b| {
        b.iter(PassKeypair::generate);
    });
}

fn bench_sign_message(c: &mut Criterion) {
    let keypair = PassKeypair::generate();
    let message = b"mint credential 42 to self; mode=IssuerOnly";

    c.bench_function("ed25519/sign_message", |b| {
        b.iter(|| keypair.sign(message));
    });
}

fn bench_verify_signature(c: &mut Criterion) {
    let keypair = PassKeypair::generate();
    let message = b"mint credential 42 to self; mode=IssuerOnly";
    let signature = keypair.sign(message);
    let public_key = keypair.public_key();

    c.bench_function("ed25519/verify_signature", |b| {
        b.iter(|| public_key.verify(message, &signature));
    });
}

fn bench_address_derivation(c: &mut Criterion) {
    let public_key = PassKeypair::generate().public_key();
    let factory = Address::from_public_key(&public_key);

    c.bench_function("address/from_public_key", |b| {
        b.iter(|| Address::from_public_key(&public_key));
    });
    c.bench_function("address/derive_instance", |b| {
        b.iter(|| Address::derive_instance(&factory, 42));
    });
}

fn bench_envelope(c: &mut Criterion) {
    let mut group = c.benchmark_group("envelope/sign_verify");
    let keypair = PassKeypair::generate();
    let target = Address::derive_instance(&Address::from_public_key(&keypair.public_key()), 1);

    for size in [32usize, 256, 4096] {
        let body = vec![7u8; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &body, |b, body| {
            b.iter(|| {
                let envelope = SignedEnvelope::sign(&keypair, target, 1, body.clone()).unwrap();
                envelope.verify().unwrap()
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_keypair_generation,
    bench_sign_message,
    bench_verify_signature,
    bench_address_derivation,
    bench_envelope
);
criterion_main!(benches);
