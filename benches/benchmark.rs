use criterion::{Criterion, criterion_group, criterion_main};
use core::ffi::c_void;
use libloading::Library as LibLoading;
use oshandle::{Library, MemoryMap};
use std::{hint::black_box, path::PathBuf};

#[cfg(target_os = "linux")]
const PATH: &str = "libm.so.6";
#[cfg(target_os = "macos")]
const PATH: &str = "/usr/lib/libSystem.B.dylib";
#[cfg(windows)]
const PATH: &str = "kernel32.dll";

#[cfg(unix)]
const SYMBOL: &str = "cos";
#[cfg(windows)]
const SYMBOL: &str = "GetCurrentProcessId";

fn load_benchmark(c: &mut Criterion) {
    c.bench_function("oshandle:new", |b| {
        b.iter(|| Library::new(PATH).unwrap());
    });
    c.bench_function("libloading:new", |b| {
        b.iter(|| unsafe { LibLoading::new(PATH).unwrap() });
    });
}

fn get_symbol_benchmark(c: &mut Criterion) {
    let lib1 = Library::new(PATH).unwrap();
    let lib2 = unsafe { LibLoading::new(PATH).unwrap() };
    c.bench_function("oshandle:load", |b| {
        b.iter(|| lib1.load(black_box(SYMBOL)).unwrap())
    });
    c.bench_function("libloading:get", |b| {
        b.iter(|| unsafe { *lib2.get::<*mut c_void>(black_box(SYMBOL).as_bytes()).unwrap() })
    });
}

fn map_benchmark(c: &mut Criterion) {
    let path: PathBuf =
        std::env::temp_dir().join(format!("oshandle-bench-{}.bin", std::process::id()));
    std::fs::write(&path, vec![0xABu8; 1 << 20]).unwrap();
    c.bench_function("oshandle:map", |b| {
        b.iter(|| {
            let map = MemoryMap::new(&path).unwrap();
            map.bytes().iter().map(|&b| b as u64).sum::<u64>()
        })
    });
    c.bench_function("std::fs::read", |b| {
        b.iter(|| {
            let data = std::fs::read(&path).unwrap();
            data.iter().map(|&b| b as u64).sum::<u64>()
        })
    });
    let _ = std::fs::remove_file(&path);
}

criterion_group!(benches, load_benchmark, get_symbol_benchmark, map_benchmark);
criterion_main!(benches);
