// Registry construction and hot-path benchmarks.
//
// Compares a full standalone deployment (template compiled per registry)
// against factory instance creation, and measures mint/burn on a live
// instance.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use humanpass_contracts::credential_registry::{CredentialRegistry, RevocationMode};
use humanpass_contracts::instance_factory::InstanceFactory;
use humanpass_contracts::roles::Role;
use humanpass_contracts::template::TemplateDefinition;
use humanpass_protocol::identity::Address;

fn addr(n: u64) -> Address {
    let mut bytes = [0u8; 32];
    bytes[..8].copy_from_slice(&n.to_be_bytes());
    Address::from_bytes(bytes)
}

fn bench_full_deploy(c: &mut Criterion) {
    c.bench_function("registry/full_deploy", |b| {
        b.iter(|| CredentialRegistry::deploy(TemplateDefinition::new("Human Pass", "HPASS")));
    });
}

fn bench_create_instance(c: &mut Criterion) {
    let factory =
        InstanceFactory::new(addr(0), TemplateDefinition::new("Human Pass", "HPASS")).unwrap();
    let caller = addr(1);

    c.bench_function("factory/create_instance", |b| {
        b.iter(|| factory.create_instance(caller).unwrap());
    });
}

fn bench_mint_burn(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry/mint_burn");

    for holders in [10u64, 100, 1_000] {
        let admin = addr(0);
        let (mut registry, _) =
            CredentialRegistry::deploy(TemplateDefinition::new("Human Pass", "HPASS")).unwrap();
        registry.initialize(admin, addr(1)).unwrap();
        for n in 1..=holders {
            registry.grant_role(&admin, Role::Issuer, addr(n)).unwrap();
        }

        group.throughput(Throughput::Elements(holders));
        group.bench_with_input(BenchmarkId::from_parameter(holders), &holders, |b, &holders| {
            b.iter(|| {
                for n in 1..=holders {
                    let holder = addr(n);
                    registry
                        .mint(&holder, holder, n, RevocationMode::IssuerOnly)
                        .unwrap();
                }
                for n in 1..=holders {
                    registry.burn(&admin, n).unwrap();
                }
                registry.take_events();
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_full_deploy,
    bench_create_instance,
    bench_mint_burn
);
criterion_main!(benches);
