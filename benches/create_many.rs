//! This bench test builds a deep management hierarchy, first in memory and
//! then in a file-backed directory where every mutation rewrites the data
//! file.

#![allow(missing_docs)]

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use staffdir::{Directory, StaffFields, StaffService, Tree};
use tempfile::TempDir;

/// Each record reports to the one created before it.
fn chain(n: i64) -> impl Iterator<Item = StaffFields> {
    (0..n).map(|i| StaffFields {
        first_name: Some(format!("Staff{i}")),
        last_name: Some("Member".to_string()),
        email: Some(format!("staff{i}@example.com")),
        ..StaffFields::default()
    }
    .with_pid(i))
}

fn create_in_memory(c: &mut Criterion) {
    c.bench_function("create 500 in memory", |b| {
        b.iter(|| {
            let service = StaffService::new(Tree::default());
            for fields in chain(500) {
                service.create(&fields).unwrap();
            }
            service
        });
    });
}

fn create_on_disk(c: &mut Criterion) {
    c.bench_function("create 50 on disk", |b| {
        b.iter_batched(
            || {
                let tmp_dir = TempDir::new().unwrap();
                let directory = Directory::init(tmp_dir.path().to_path_buf()).unwrap();
                (tmp_dir, StaffService::new(directory))
            },
            |(tmp_dir, service)| {
                for fields in chain(50) {
                    service.create(&fields).unwrap();
                }
                tmp_dir
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, create_in_memory, create_on_disk);
criterion_main!(benches);
