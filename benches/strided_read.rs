use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ncmdarray::{
    array::{Array, ArrayBufferMut, ArrayCreateOptions},
    array_subset::{ArraySubset, Selection},
    data_type::NumericType,
    engine::MemoryEngine,
    group::{ArrayDimension, Group},
};

fn array(root: &Group, size: u64) -> Array {
    let array = root
        .create_md_array(
            "a",
            &[
                ArrayDimension::Named { name: "y", size },
                ArrayDimension::Named { name: "x", size },
            ],
            &NumericType::Float32.into(),
            &ArrayCreateOptions::default(),
        )
        .unwrap();
    let data = vec![1.0f32; (size * size).try_into().unwrap()];
    array
        .write_elements(&ArraySubset::new_with_shape(vec![size, size]), &data)
        .unwrap();
    array
}

fn strided_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("strided_read");
    for size in [64u64, 128u64, 256u64].iter() {
        let root = Group::create_root(Box::new(MemoryEngine::new()));
        let array = array(&root, *size);
        let count = usize::try_from(*size).unwrap();
        group.throughput(Throughput::Bytes(size * size * 4));

        let contiguous = Selection::new_contiguous(vec![0, 0], vec![count, count]).unwrap();
        group.bench_with_input(BenchmarkId::new("contiguous", size), size, |b, _| {
            let mut data = vec![0f32; count * count];
            b.iter(|| {
                array
                    .read(
                        &contiguous,
                        &NumericType::Float32.into(),
                        ArrayBufferMut::Bytes(bytemuck::cast_slice_mut(&mut data)),
                    )
                    .unwrap();
            });
        });

        let stride = isize::try_from(count).unwrap();
        let transposed =
            Selection::new(vec![0, 0], vec![count, count], vec![1, 1], vec![1, stride]).unwrap();
        group.bench_with_input(BenchmarkId::new("transposed", size), size, |b, _| {
            let mut data = vec![0f32; count * count];
            b.iter(|| {
                array
                    .read(
                        &transposed,
                        &NumericType::Float32.into(),
                        ArrayBufferMut::Bytes(bytemuck::cast_slice_mut(&mut data)),
                    )
                    .unwrap();
            });
        });

        group.bench_with_input(BenchmarkId::new("converted", size), size, |b, _| {
            let mut data = vec![0f64; count * count];
            b.iter(|| {
                array
                    .read(
                        &contiguous,
                        &NumericType::Float64.into(),
                        ArrayBufferMut::Bytes(bytemuck::cast_slice_mut(&mut data)),
                    )
                    .unwrap();
            });
        });
    }
    group.finish();
}

criterion_group!(benches, strided_read);
criterion_main!(benches);
