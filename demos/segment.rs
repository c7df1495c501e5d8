use ictclas_rs::Segmenter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    // Honors ICTCLAS_LIBRARY_PATH and ICTCLAS_DATA_PATH when set.
    let segmenter = Segmenter::init()?;

    let paragraphs = [
        "欢迎使用计算所语言技术平台。",
        "他说的确实在理。",
        "今天天气真好，我们去公园散步吧。",
    ];
    for paragraph in paragraphs {
        segmenter.segment(paragraph, |result| match result {
            Ok(annotated) => println!("{annotated}"),
            Err(error) => eprintln!("segmentation failed: {error}"),
        })?;
    }

    segmenter.run_until_idle();
    segmenter.close()?;
    Ok(())
}
