pub mod rank_penalty_test;
