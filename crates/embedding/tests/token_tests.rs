use candle_core::{DType, Device, Result, Tensor};
use embedding::token::{TokenEmbedding, TokenEmbeddingConfig};

fn make_ids(data: &[u32], shape: (usize, usize)) -> Result<Tensor> {
    Tensor::from_slice(data, shape, &Device::Cpu)
}

fn config(vocab_size: usize, hidden_dim: usize, dtype: DType) -> TokenEmbeddingConfig {
    TokenEmbeddingConfig {
        vocab_size,
        hidden_dim,
        dtype,
        device: Device::Cpu,
    }
}

#[test]
fn forward_shape_and_dtype_match_config() -> Result<()> {
    let config = config(8, 4, DType::F16);
    let embedding = TokenEmbedding::new(config.clone())?;
    let token_ids = make_ids(&[0, 1, 2, 3, 4, 5], (3, 2))?;

    let output = embedding.forward(&token_ids)?;

    assert_eq!(output.dims(), &[3, 2, config.hidden_dim]);
    assert_eq!(output.dtype(), config.dtype);
    Ok(())
}

#[test]
fn single_step_ids_produce_batch_rows() -> Result<()> {
    let embedding = TokenEmbedding::new(config(8, 4, DType::F32))?;
    let ids = Tensor::from_slice(&[3i64, 7], 2, &Device::Cpu)?;
    let output = embedding.forward(&ids)?;
    assert_eq!(output.dims(), &[2, 4]);

    let row = output.get(1)?.to_vec1::<f32>()?;
    let table = embedding.weight().get(7)?.to_vec1::<f32>()?;
    assert_eq!(row, table);
    Ok(())
}

#[test]
fn padding_id_maps_to_the_same_zero_vector_everywhere() -> Result<()> {
    let embedding = TokenEmbedding::new(config(10, 6, DType::F32))?;
    let token_ids = make_ids(&[0, 5, 3, 0, 0, 9], (3, 2))?;
    let output = embedding.forward(&token_ids)?;

    let zeros = vec![0f32; 6];
    for (position, batch) in [(0usize, 0usize), (1, 1), (2, 0)] {
        let vector = output.get(position)?.get(batch)?.to_vec1::<f32>()?;
        assert_eq!(vector, zeros, "padding at ({position}, {batch})");
    }
    Ok(())
}

#[test]
fn from_weight_overrides_a_non_zero_padding_row() -> Result<()> {
    let weight = Tensor::ones((4, 3), DType::F32, &Device::Cpu)?;
    let embedding = TokenEmbedding::from_weight(config(4, 3, DType::F32), weight)?;
    let table = embedding.weight().to_vec2::<f32>()?;
    assert_eq!(table[0], vec![0.0; 3]);
    assert_eq!(table[1], vec![1.0; 3]);
    Ok(())
}

#[test]
fn forward_rejects_out_of_range_ids() -> Result<()> {
    let embedding = TokenEmbedding::new(config(4, 3, DType::F32))?;
    let token_ids = make_ids(&[0, 4], (1, 2))?;

    let err = embedding.forward(&token_ids).unwrap_err();
    assert!(err.to_string().contains("token id 4 exceeds vocab size"));
    Ok(())
}

#[test]
fn forward_rejects_float_ids_and_negative_ids() -> Result<()> {
    let embedding = TokenEmbedding::new(config(4, 3, DType::F32))?;
    let floats = Tensor::zeros((2, 2), DType::F32, &Device::Cpu)?;
    assert!(embedding.forward(&floats).is_err());

    let negative = Tensor::from_slice(&[1i64, -2], (1, 2), &Device::Cpu)?;
    let err = embedding.forward(&negative).unwrap_err();
    assert!(err.to_string().contains("negative token id -2"));
    Ok(())
}
