//! # Address Book Benchmarks
//!
//! | Operation | Book size | Target |
//! |-----------|-----------|--------|
//! | add_address | 0 → 5000 | < 10µs per insert |
//! | pick_address | 5000 | < 1ms |
//! | random_addresses(selection_size) | 5000 | < 1ms |

use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::Rng;

use seed_discovery::adapters::SeededRandomSource;
use seed_discovery::test_utils::{indexed_node_id, node_id, ControllableTimeSource};
use seed_discovery::{AddressBook, AddressBookConfig, PeerAddress};

fn random_public_addr(index: u16, rng: &mut impl Rng) -> PeerAddress {
    let ip = IpAddr::V4(Ipv4Addr::new(
        rng.gen_range(11..=99),
        rng.gen(),
        rng.gen(),
        rng.gen_range(1..=254),
    ));
    PeerAddress::new(indexed_node_id(index), ip, 26656)
}

fn filled_book(count: u16) -> AddressBook {
    let book = AddressBook::new(
        node_id(0),
        AddressBookConfig::default(),
        Arc::new(ControllableTimeSource::new(1_700_000_000)),
        Arc::new(SeededRandomSource::new(42)),
    )
    .unwrap();
    let mut rng = rand::thread_rng();
    for i in 0..count {
        let src = random_public_addr(u16::MAX - (i % 64), &mut rng);
        book.add_address(random_public_addr(i, &mut rng), src);
    }
    book
}

fn bench_add_address(c: &mut Criterion) {
    let mut group = c.benchmark_group("address-book-add");

    for size in [1000u16, 5000] {
        group.throughput(Throughput::Elements(u64::from(size)));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| black_box(filled_book(size)));
        });
    }

    group.finish();
}

fn bench_selection(c: &mut Criterion) {
    let mut group = c.benchmark_group("address-book-select");
    let book = filled_book(5000);
    let exclude = HashSet::new();

    group.bench_function("pick_address", |b| {
        b.iter(|| black_box(book.pick_address(&exclude)));
    });
    group.bench_function("random_addresses", |b| {
        b.iter(|| black_box(book.random_addresses(book.selection_size())));
    });

    group.finish();
}

criterion_group!(benches, bench_add_address, bench_selection);
criterion_main!(benches);
