use ictclas_rs::{parse_terms, Segmenter};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let segmenter = Segmenter::init()?;

    segmenter.segment("书是人类进步的阶梯。", |result| match result {
        Ok(annotated) => {
            for term in parse_terms(&annotated) {
                println!(
                    "{} / {} (class={})",
                    term.form,
                    term.tag,
                    term.tag_class().unwrap_or('?')
                );
            }
        }
        Err(error) => eprintln!("segmentation failed: {error}"),
    })?;

    segmenter.run_until_idle();
    segmenter.close()?;
    Ok(())
}
