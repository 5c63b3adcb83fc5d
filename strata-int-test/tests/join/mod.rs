//! KNN join integration tests, checked against a brute-force scan.

mod knn_join_test;
