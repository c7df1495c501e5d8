use ictclas_rs::Segmenter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "userdict.txt".to_string());

    let segmenter = Segmenter::init()?;

    // The entries take effect on the next operation; the engine
    // re-initializes behind the scenes. The native library skips the
    // first line of the file, so keep a header there.
    segmenter.import_dictionary(&path, |result| match result {
        Ok(count) => println!("imported {count} entries"),
        Err(error) => eprintln!("import failed: {error}"),
    })?;
    segmenter.run_until_idle();

    segmenter.segment("蓝翔挖掘机技术哪家强", |result| match result {
        Ok(annotated) => println!("{annotated}"),
        Err(error) => eprintln!("segmentation failed: {error}"),
    })?;
    segmenter.run_until_idle();

    println!(
        "engine initializations: {}",
        segmenter.initialization_count()
    );
    segmenter.close()?;
    Ok(())
}
