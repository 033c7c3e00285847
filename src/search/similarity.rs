pub fn log_tf_idf(document_frequency: u64, total_document_count: u64, term_frequency: u64) -> f64 {
    if document_frequency == 0 || term_frequency == 0 {
        return 0.0;
    }

    let tf = 1.0 + (term_frequency as f64).log2();
    let quotient = (total_document_count + 1) / document_frequency;
    let idf = (quotient as f64).log2();
    tf * idf
}
