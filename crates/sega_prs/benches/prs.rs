use divan::AllocProfiler;

#[global_allocator]
static ALLOC: AllocProfiler = AllocProfiler::system();

fn main() {
    divan::main();
}

fn noise(seed: u64, len: usize) -> Vec<u8> {
    let mut state = seed;
    (0..len)
        .map(|_| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (state >> 56) as u8
        })
        .collect()
}

/// A texture-like payload: runs, gradients and a little noise.
fn sample_asset() -> Vec<u8> {
    let mut data = Vec::with_capacity(256 * 1024);
    for row in 0..1024u32 {
        data.extend(std::iter::repeat_n((row % 251) as u8, 128));
        data.extend((0..64u32).map(|x| ((x * 3 + row) % 256) as u8));
        data.extend(noise(row as u64, 64));
    }
    data
}

pub mod compress {
    use std::io::Cursor;

    use divan::Bencher;

    #[divan::bench]
    fn asset(bencher: Bencher) {
        bencher.with_inputs(crate::sample_asset).bench_refs(|data| {
            let mut encoded = Vec::new();
            sega_prs::compress(&mut Cursor::new(&data[..]), &mut encoded).unwrap();
            divan::black_box(encoded);
        });
    }

    #[divan::bench]
    fn noise(bencher: Bencher) {
        bencher
            .with_inputs(|| crate::noise(7, 256 * 1024))
            .bench_refs(|data| {
                let mut encoded = Vec::new();
                sega_prs::compress(&mut Cursor::new(&data[..]), &mut encoded).unwrap();
                divan::black_box(encoded);
            });
    }
}

pub mod decompress {
    use std::io::Cursor;

    use divan::Bencher;

    #[divan::bench]
    fn asset(bencher: Bencher) {
        bencher
            .with_inputs(|| {
                let data = crate::sample_asset();
                let mut encoded = Vec::new();
                sega_prs::compress(&mut Cursor::new(&data[..]), &mut encoded).unwrap();
                encoded
            })
            .bench_refs(|encoded| {
                divan::black_box(sega_prs::decompress(&mut Cursor::new(&encoded[..])).unwrap());
            });
    }
}
